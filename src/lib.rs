//! # Snapreel
//!
//! Pick a filter, watch it live, burn it into a new video.
//!
//! This library decodes a video into frames, runs them through a chain of pure,
//! composable filters, and either previews the result live (with a blurred background
//! layer) or re-encodes it into a new file with the original audio untouched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapreel::{config::Config, session::EditorSession};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut editor = EditorSession::open(Config::default(), "clip.mp4".as_ref())?;
//! editor.select_filter_named("noir")?;
//!
//! let outcome = editor.export("clip-noir.mp4").outcome().await;
//! assert!(outcome.is_completed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frames, media handles, the frame source and its decoder/encoder backends
//! - [`filters`] - The [`Filter`](filters::Filter) trait, composition, chains and the catalog
//! - [`preview`] - Live playback with a foreground and a blurred background layer
//! - [`export`] - Full re-encode with cancellation and no partial files left behind
//! - [`session`] - Selection state machine and the session-state reducer
//! - [`library`] - Destination for saved copies
//! - [`config`] - Configuration management
//!
//! ## Writing a Filter
//!
//! ```rust
//! use snapreel::filters::Filter;
//! use snapreel::video::Frame;
//!
//! #[derive(Debug)]
//! struct Darken;
//!
//! impl Filter for Darken {
//!     fn name(&self) -> &str {
//!         "darken"
//!     }
//!
//!     fn apply(&self, frame: &Frame) -> Frame {
//!         let mut image = frame.as_image().clone();
//!         image.pixels_mut().for_each(|p| p.0 = p.0.map(|v| v / 2));
//!         frame.with_image(image)
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod library;
pub mod preview;
pub mod session;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{EditorError, ErrorKind, Result},
    export::{ExportJob, ExportOutcome, ExportPipeline},
    filters::{Filter, FilterCatalog, FilterChain, FilterRegistry},
    preview::PreviewPipeline,
    session::{EditorSession, PlaybackSession},
    video::{Frame, MediaAsset},
};
