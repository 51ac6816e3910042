use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{FilterError, Result};
use crate::filters::blur::{self, BlurFilter};
use crate::filters::color;
use crate::filters::grain::GrainFilter;
use crate::filters::traits::{FilterConfig, SharedFilter};
use crate::filters::vignette::VignetteFilter;

type Factory = Box<dyn Fn(&FilterConfig) -> Result<SharedFilter> + Send + Sync>;

/// Names of the built-in filters, in the order the catalog shows them by default
pub const BUILTIN_FILTERS: &[&str] = &[
    "sepia", "mono", "noir", "chrome", "fade", "instant", "process", "tonal", "transfer",
    "invert", "vignette", "grain", "blur",
];

/// Registry of filter factories
///
/// Filters are registered by name and built from a [`FilterConfig`], so the same name can
/// produce differently tuned filters. Factories validate their parameters.
pub struct FilterRegistry {
    factories: BTreeMap<String, Factory>,
}

impl FilterRegistry {
    /// Create a new registry with all built-in filters
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register_builtin_filters();
        registry
    }

    fn register_builtin_filters(&mut self) {
        self.register("sepia", |c| Ok(Arc::new(color::sepia(c.intensity))));
        self.register("mono", |c| Ok(Arc::new(color::mono(c.intensity))));
        self.register("noir", |c| Ok(Arc::new(color::noir(c.intensity))));
        self.register("chrome", |c| Ok(Arc::new(color::chrome(c.intensity))));
        self.register("fade", |c| Ok(Arc::new(color::fade(c.intensity))));
        self.register("instant", |c| Ok(Arc::new(color::instant(c.intensity))));
        self.register("process", |c| Ok(Arc::new(color::process(c.intensity))));
        self.register("tonal", |c| Ok(Arc::new(color::tonal(c.intensity))));
        self.register("transfer", |c| Ok(Arc::new(color::transfer(c.intensity))));
        self.register("invert", |_| Ok(Arc::new(color::invert())));

        self.register("vignette", |c| {
            let radius = c.get_f32_or("radius", 0.5);
            check_range("vignette", "radius", radius, 0.0, 1.0)?;
            Ok(Arc::new(VignetteFilter::new(c.intensity, radius)))
        });

        self.register("grain", |c| {
            let seed = c.get_i64_or("seed", 0);
            Ok(Arc::new(GrainFilter::new(c.intensity, seed as u64)))
        });

        self.register("blur", |c| {
            let radius = c.get_i64_or("radius", 10);
            if !(0..=blur::MAX_RADIUS as i64).contains(&radius) {
                return Err(FilterError::InvalidParameter {
                    filter: "blur".to_string(),
                    key: "radius".to_string(),
                    value: radius.to_string(),
                }
                .into());
            }
            Ok(Arc::new(BlurFilter::new(radius as u32)))
        });
    }

    /// Register a custom filter factory, replacing any filter with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&FilterConfig) -> Result<SharedFilter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Build the filter `name` from `config`
    pub fn build(&self, name: &str, config: &FilterConfig) -> Result<SharedFilter> {
        let factory = self.factories.get(name).ok_or_else(|| FilterError::NotFound {
            name: name.to_string(),
        })?;
        check_range(name, "intensity", config.intensity, 0.0, 1.0)?;
        factory(config)
    }

    /// All registered names, sorted
    pub fn available_filters(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(filter: &str, key: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter {
            filter: filter.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;
    use crate::filters::compose::identity;

    #[test]
    fn test_builtin_filters_available() {
        let registry = FilterRegistry::new();
        for name in BUILTIN_FILTERS {
            assert!(registry.has_filter(name), "missing {}", name);
        }
        assert_eq!(registry.len(), BUILTIN_FILTERS.len());
    }

    #[test]
    fn test_build_filter() {
        let registry = FilterRegistry::new();
        let blur = registry.build("blur", &FilterConfig::default().set("radius", 4)).unwrap();
        assert_eq!(blur.name(), "blur");

        let noir = registry.build("noir", &FilterConfig::default()).unwrap();
        assert_eq!(noir.name(), "noir");
    }

    #[test]
    fn test_unknown_filter() {
        let registry = FilterRegistry::new();
        let err = registry.build("polaroid", &FilterConfig::default()).unwrap_err();
        assert!(matches!(err, EditorError::Filter(FilterError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let registry = FilterRegistry::new();

        let config = FilterConfig { intensity: 1.5, ..FilterConfig::default() };
        assert!(registry.build("sepia", &config).is_err());

        let config = FilterConfig::default().set("radius", -3);
        let err = registry.build("blur", &config).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Filter(FilterError::InvalidParameter { ref key, .. }) if key == "radius"
        ));
    }

    #[test]
    fn test_custom_filter_registration() {
        let mut registry = FilterRegistry::new();
        registry.register("none", |_| Ok(identity()));

        assert!(registry.has_filter("none"));
        assert_eq!(registry.len(), BUILTIN_FILTERS.len() + 1);
        assert!(registry.build("none", &FilterConfig::default()).unwrap().is_identity());
    }
}
