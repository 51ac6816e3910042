//! # Preview Module
//!
//! Live playback of an asset through a filter chain, with a blurred background layer
//! decoded and filtered independently of the foreground.

pub mod pipeline;
pub mod worker;

pub use pipeline::{unfiltered, PlaybackStatus, PreviewFrame, PreviewHandle, PreviewPipeline, Settled};
pub use worker::Layer;
