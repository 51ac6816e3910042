//! # Export Module
//!
//! One-shot re-encode of a filtered asset into a new media file, with cooperative
//! cancellation and no partial files left behind on failure.

pub mod job;
pub mod output;
pub mod pipeline;

pub use job::{ExportJob, ExportOutcome, ExportProgress, ExportedMedia};
pub use output::PartialOutput;
pub use pipeline::{ExportHandle, ExportPipeline};
