use std::sync::Arc;

use crate::filters::traits::{Filter, FilterMetadata, SharedFilter};
use crate::video::types::Frame;

/// The neutral filter: returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Filter for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn description(&self) -> &str {
        "No filter"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        frame.clone()
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// `second` applied to the output of `first`
#[derive(Debug, Clone)]
pub struct Composed {
    name: String,
    description: String,
    first: SharedFilter,
    second: SharedFilter,
}

impl Composed {
    /// Composition published under its own name, e.g. a catalog effect built from primitives
    pub fn named(
        name: impl Into<String>,
        description: impl Into<String>,
        first: SharedFilter,
        second: SharedFilter,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            first,
            second,
        }
    }
}

impl Filter for Composed {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&self, frame: &Frame) -> Frame {
        self.second.apply(&self.first.apply(frame))
    }

    fn metadata(&self) -> FilterMetadata {
        let (a, b) = (self.first.metadata(), self.second.metadata());
        FilterMetadata {
            performance_impact: (a.performance_impact + b.performance_impact).min(1.0),
            parameters: a.parameters.into_iter().chain(b.parameters).collect(),
        }
    }
}

/// Filter equivalent to applying `f`, then `g`
///
/// Identity operands are dropped, so `compose(identity, f)` is `f` itself.
pub fn compose(f: SharedFilter, g: SharedFilter) -> SharedFilter {
    if f.is_identity() {
        return g;
    }
    if g.is_identity() {
        return f;
    }
    let name = format!("{}+{}", f.name(), g.name());
    let description = format!("{}, then {}", f.name(), g.name());
    Arc::new(Composed::named(name, description, f, g))
}

pub fn identity() -> SharedFilter {
    Arc::new(Identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::color::{invert, sepia};
    use crate::filters::BlurFilter;
    use crate::video::testing::gradient_frame;

    #[test]
    fn test_compose_applies_left_then_right() {
        let frame = gradient_frame(16, 12, 3);
        let (f, g): (SharedFilter, SharedFilter) = (Arc::new(sepia(1.0)), Arc::new(BlurFilter::new(2)));

        let composed = compose(f.clone(), g.clone());
        assert_eq!(composed.apply(&frame), g.apply(&f.apply(&frame)));
        assert_eq!(composed.name(), "sepia+blur");
    }

    #[test]
    fn test_composition_is_associative() {
        let frame = gradient_frame(16, 12, 5);
        let f: SharedFilter = Arc::new(sepia(0.7));
        let g: SharedFilter = Arc::new(invert());
        let h: SharedFilter = Arc::new(BlurFilter::new(3));

        let left = compose(compose(f.clone(), g.clone()), h.clone());
        let right = compose(f, compose(g, h));
        assert_eq!(left.apply(&frame), right.apply(&frame));
    }

    #[test]
    fn test_identity_is_neutral() {
        let frame = gradient_frame(8, 8, 1);
        let f: SharedFilter = Arc::new(invert());

        assert_eq!(compose(identity(), f.clone()).apply(&frame), f.apply(&frame));
        assert_eq!(compose(f.clone(), identity()).apply(&frame), f.apply(&frame));
        assert_eq!(identity().apply(&frame), frame);
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let frame = gradient_frame(8, 8, 2);
        let copy = frame.clone();
        let _ = compose(Arc::new(invert()), Arc::new(sepia(1.0))).apply(&frame);
        assert_eq!(frame, copy);
    }
}
