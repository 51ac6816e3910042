//! # Video Module
//!
//! Media handles, decoded frames, and the backends that read and write them.

pub mod backend;
pub mod ffmpeg;
pub mod raw;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DecoderBackend, EncodeSettings, EncoderBackend, FrameDecoder, FrameEncoder, MediaBackends};
pub use ffmpeg::FfmpegBackend;
pub use raw::{RawBackend, RawVideoWriter, RAW_EXTENSION};
pub use source::FrameSource;
pub use types::{Frame, FrameRate, MediaAsset, Orientation};
