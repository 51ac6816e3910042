//! # Filters Module
//!
//! Pure frame-to-frame transformations, their composition, and the catalog a session
//! selects from.
//!
//! Every filter implements [`Filter`]: `apply` never mutates its input, keeps the frame's
//! index and timestamp, and gives the same output for the same input. Composition is
//! associative with [`identity`] as the neutral element, so a [`FilterChain`] can be built
//! in any grouping without changing the rendered result.

pub mod blur;
pub mod catalog;
pub mod chain;
pub mod color;
pub mod compose;
pub mod grain;
pub mod registry;
pub mod traits;
pub mod vignette;

mod pixels;

pub use blur::BlurFilter;
pub use catalog::{FilterCatalog, Thumbnail};
pub use chain::{FilterChain, FilterSelection, SharedChain};
pub use color::{ColorMatrix, ColorMatrixFilter, ToneCurve, ToneCurveFilter};
pub use compose::{compose, identity, Composed, Identity};
pub use grain::GrainFilter;
pub use registry::{FilterRegistry, BUILTIN_FILTERS};
pub use traits::{ConfigValue, Filter, FilterConfig, FilterMetadata, SharedFilter};
pub use vignette::VignetteFilter;
