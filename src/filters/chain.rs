use std::fmt;
use std::sync::Arc;

use crate::filters::compose::{compose, identity};
use crate::filters::traits::SharedFilter;
use crate::video::types::Frame;

/// Ordered list of filters applied left to right to every frame
///
/// The empty chain is the "no filter" state. A chain is an immutable value: `then` and
/// `concat` build new chains, and the preview and export pipelines share one chain
/// through an `Arc` without locking.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<SharedFilter>,
}

impl FilterChain {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn single(filter: SharedFilter) -> Self {
        Self { filters: vec![filter] }
    }

    pub fn from_filters(filters: Vec<SharedFilter>) -> Self {
        Self { filters }
    }

    /// This chain with `filter` appended
    pub fn then(&self, filter: SharedFilter) -> Self {
        let mut filters = self.filters.clone();
        filters.push(filter);
        Self { filters }
    }

    pub fn concat(&self, other: &FilterChain) -> Self {
        let mut filters = self.filters.clone();
        filters.extend(other.filters.iter().cloned());
        Self { filters }
    }

    pub fn apply(&self, frame: &Frame) -> Frame {
        let mut active = self.filters.iter().filter(|f| !f.is_identity());
        match active.next() {
            None => frame.clone(),
            Some(first) => active.fold(first.apply(frame), |acc, f| f.apply(&acc)),
        }
    }

    /// Collapse the chain into one filter
    pub fn compose(&self) -> SharedFilter {
        self.filters.iter().cloned().fold(identity(), compose)
    }

    pub fn is_identity(&self) -> bool {
        self.filters.iter().all(|f| f.is_identity())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilterChain").field(&self.names()).finish()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.names().join(" -> "))
        }
    }
}

impl From<SharedFilter> for FilterChain {
    fn from(filter: SharedFilter) -> Self {
        Self::single(filter)
    }
}

/// Shared handle the pipelines hold
pub type SharedChain = Arc<FilterChain>;

/// Which catalog entry is active in an editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterSelection {
    #[default]
    Unselected,
    Selected(usize),
}

impl FilterSelection {
    /// Select catalog entry `index`
    ///
    /// Returns `None` when `index` is already selected, since selecting the active
    /// filter changes nothing.
    pub fn select(self, index: usize) -> Option<Self> {
        match self {
            FilterSelection::Selected(current) if current == index => None,
            _ => Some(FilterSelection::Selected(index)),
        }
    }

    pub fn reset(self) -> Self {
        FilterSelection::Unselected
    }

    pub fn index(self) -> Option<usize> {
        match self {
            FilterSelection::Selected(index) => Some(index),
            FilterSelection::Unselected => None,
        }
    }

    pub fn is_selected(self) -> bool {
        matches!(self, FilterSelection::Selected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::color::{invert, mono, sepia};
    use crate::filters::BlurFilter;
    use crate::video::testing::gradient_frame;

    fn sample_chain() -> FilterChain {
        FilterChain::identity()
            .then(Arc::new(sepia(0.8)))
            .then(Arc::new(BlurFilter::new(2)))
    }

    #[test]
    fn test_empty_chain_returns_input() {
        let frame = gradient_frame(10, 6, 0);
        assert_eq!(FilterChain::identity().apply(&frame), frame);
        assert!(FilterChain::identity().is_identity());
    }

    #[test]
    fn test_appending_identity_changes_nothing() {
        let frame = gradient_frame(12, 8, 3);
        let chain = sample_chain();
        let extended = chain.then(identity());

        assert_eq!(extended.apply(&frame), chain.apply(&frame));
        assert_eq!(extended.len(), chain.len() + 1);
    }

    #[test]
    fn test_chain_matches_composed_filter() {
        let frame = gradient_frame(12, 8, 7);
        let chain = sample_chain().then(Arc::new(invert()));
        assert_eq!(chain.compose().apply(&frame), chain.apply(&frame));
    }

    #[test]
    fn test_build_order_does_not_matter() {
        let frame = gradient_frame(12, 8, 2);
        let a = FilterChain::single(Arc::new(mono(1.0)));
        let b = FilterChain::single(Arc::new(invert())).then(Arc::new(BlurFilter::new(1)));

        let whole = FilterChain::from_filters(vec![
            Arc::new(mono(1.0)),
            Arc::new(invert()),
            Arc::new(BlurFilter::new(1)),
        ]);
        assert_eq!(a.concat(&b).apply(&frame), whole.apply(&frame));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(FilterChain::identity().to_string(), "none");
        assert_eq!(sample_chain().to_string(), "sepia -> blur");
    }

    #[test]
    fn test_selection_transitions() {
        let selection = FilterSelection::default();
        assert_eq!(selection, FilterSelection::Unselected);

        let selection = selection.select(2).unwrap();
        assert_eq!(selection.index(), Some(2));
        assert!(selection.select(2).is_none());

        let selection = selection.select(4).unwrap();
        assert_eq!(selection, FilterSelection::Selected(4));
        assert!(!selection.reset().is_selected());
    }
}
