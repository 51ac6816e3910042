use rayon::prelude::*;
use tracing::debug;

use crate::config::FiltersConfig;
use crate::error::{FilterError, Result};
use crate::filters::chain::{FilterChain, FilterSelection};
use crate::filters::registry::FilterRegistry;
use crate::filters::traits::{FilterConfig, SharedFilter};
use crate::video::types::Frame;

/// The fixed, ordered set of filters a session can select from
#[derive(Debug, Clone)]
pub struct FilterCatalog {
    filters: Vec<SharedFilter>,
}

/// A catalog entry rendered onto a sample frame
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub index: usize,
    pub name: String,
    pub frame: Frame,
}

impl FilterCatalog {
    pub fn new(filters: Vec<SharedFilter>) -> Self {
        Self { filters }
    }

    /// Build every filter named in `config.catalog`, in order
    pub fn from_config(registry: &FilterRegistry, config: &FiltersConfig) -> Result<Self> {
        let default_params = FilterConfig::default();
        let filters = config
            .catalog
            .iter()
            .map(|name| {
                let params = config.params.get(name).unwrap_or(&default_params);
                registry.build(name, params)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Built filter catalog with {} entries", filters.len());
        Ok(Self { filters })
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&SharedFilter> {
        self.filters.get(index).ok_or_else(|| {
            FilterError::IndexOutOfRange {
                index,
                len: self.filters.len(),
            }
            .into()
        })
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.filters.iter().position(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// The chain a selection stands for: empty when unselected, one filter otherwise
    pub fn chain_for(&self, selection: FilterSelection) -> Result<FilterChain> {
        match selection {
            FilterSelection::Unselected => Ok(FilterChain::identity()),
            FilterSelection::Selected(index) => Ok(FilterChain::single(self.get(index)?.clone())),
        }
    }

    /// Render `frame`, downscaled to `max_dimension`, under every catalog filter
    pub fn thumbnails(&self, frame: &Frame, max_dimension: u32) -> Vec<Thumbnail> {
        let small = frame.fit_within(max_dimension);
        self.filters
            .par_iter()
            .enumerate()
            .map(|(index, filter)| Thumbnail {
                index,
                name: filter.name().to_string(),
                frame: filter.apply(&small),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::EditorError;
    use crate::filters::registry::BUILTIN_FILTERS;
    use crate::video::testing::gradient_frame;

    fn default_catalog() -> FilterCatalog {
        FilterCatalog::from_config(&FilterRegistry::new(), &Config::default().filters).unwrap()
    }

    #[test]
    fn test_default_catalog_order() {
        let catalog = default_catalog();
        assert_eq!(catalog.names(), BUILTIN_FILTERS.to_vec());
        assert_eq!(catalog.position("noir"), Some(2));
    }

    #[test]
    fn test_chain_for_selection() {
        let catalog = default_catalog();
        assert!(catalog.chain_for(FilterSelection::Unselected).unwrap().is_empty());

        let chain = catalog.chain_for(FilterSelection::Selected(0)).unwrap();
        assert_eq!(chain.names(), vec!["sepia".to_string()]);

        let err = catalog.chain_for(FilterSelection::Selected(99)).unwrap_err();
        assert!(matches!(err, EditorError::Filter(FilterError::IndexOutOfRange { index: 99, .. })));
    }

    #[test]
    fn test_unknown_catalog_name_fails() {
        let mut config = Config::default().filters;
        config.catalog.push("polaroid".to_string());
        assert!(FilterCatalog::from_config(&FilterRegistry::new(), &config).is_err());
    }

    #[test]
    fn test_thumbnails_cover_catalog() {
        let catalog = default_catalog();
        let thumbs = catalog.thumbnails(&gradient_frame(64, 32, 0), 16);

        assert_eq!(thumbs.len(), catalog.len());
        assert_eq!((thumbs[0].frame.width(), thumbs[0].frame.height()), (16, 8));
        assert_eq!(thumbs[3].name, "chrome");
    }
}
