use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::VideoConfig;
use crate::error::Result;
use crate::video::ffmpeg::FfmpegBackend;
use crate::video::raw::{RawBackend, RAW_EXTENSION};
use crate::video::types::{Frame, FrameRate, MediaAsset};

/// Opens media files and hands out independent decode handles
pub trait DecoderBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Read the metadata of a media file into an asset handle
    fn probe(&self, path: &Path) -> Result<MediaAsset>;

    /// Open a fresh decoder positioned at `start_index`
    ///
    /// Every call returns a handle that is exclusively owned by the caller.
    fn open(&self, asset: &MediaAsset, start_index: u64) -> Result<Box<dyn FrameDecoder>>;
}

/// Sequential frame reader over one decode handle
pub trait FrameDecoder: Send {
    /// Next frame in presentation order, `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Everything an encoder needs to know before the first frame arrives
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// Where the encoder writes; the export pipeline points this at a partial file
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Source whose audio track is copied into the output
    pub audio_source: Option<PathBuf>,
    pub codec: String,
    pub quality: u8,
}

/// Creates encoders for finished output files
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, settings: &EncodeSettings) -> Result<Box<dyn FrameEncoder>>;
}

/// Consumes frames in non-decreasing timestamp order
///
/// Dropping an encoder without calling `finish` aborts it; whatever it wrote is
/// left for the caller to discard.
pub trait FrameEncoder: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Routes paths to the backend that understands them
///
/// `.sraw` files go to the pure-Rust raw container, everything else to ffmpeg.
#[derive(Clone)]
pub struct MediaBackends {
    raw: Arc<RawBackend>,
    ffmpeg: Arc<FfmpegBackend>,
}

impl MediaBackends {
    pub fn new(video: &VideoConfig) -> Self {
        Self {
            raw: Arc::new(RawBackend::new()),
            ffmpeg: Arc::new(FfmpegBackend::new(video)),
        }
    }

    fn is_raw(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(RAW_EXTENSION))
            .unwrap_or(false)
    }

    pub fn decoder_for(&self, path: &Path) -> Arc<dyn DecoderBackend> {
        if Self::is_raw(path) {
            self.raw.clone()
        } else {
            self.ffmpeg.clone()
        }
    }

    pub fn encoder_for(&self, path: &Path) -> Arc<dyn EncoderBackend> {
        if Self::is_raw(path) {
            self.raw.clone()
        } else {
            self.ffmpeg.clone()
        }
    }

    pub fn probe(&self, path: &Path) -> Result<MediaAsset> {
        self.decoder_for(path).probe(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_routing_by_extension() {
        let config = Config::default();
        let backends = MediaBackends::new(&config.video);

        assert_eq!(backends.decoder_for(Path::new("clip.sraw")).name(), "raw");
        assert_eq!(backends.decoder_for(Path::new("clip.SRAW")).name(), "raw");
        assert_eq!(backends.decoder_for(Path::new("clip.mp4")).name(), "ffmpeg");
        assert_eq!(backends.encoder_for(Path::new("out.mov")).name(), "ffmpeg");
        assert_eq!(backends.encoder_for(Path::new("out.sraw")).name(), "raw");
    }
}
