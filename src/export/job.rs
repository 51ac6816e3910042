use std::path::{Path, PathBuf};

use crate::error::{EditorError, ErrorKind};
use crate::filters::SharedChain;
use crate::video::types::MediaAsset;

/// One export request
///
/// The chain is captured when the job is created. Chains are immutable, so an editing
/// session that later switches filters swaps its own handle and never touches this one.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub asset: MediaAsset,
    pub chain: SharedChain,
    pub destination: PathBuf,
}

impl ExportJob {
    pub fn new(asset: MediaAsset, chain: SharedChain, destination: impl Into<PathBuf>) -> Self {
        Self {
            asset,
            chain,
            destination: destination.into(),
        }
    }
}

/// Frames encoded so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportProgress {
    pub frames_done: u64,
    pub total_frames: u64,
}

impl ExportProgress {
    /// Completion in 0.0..=1.0
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.frames_done as f64 / self.total_frames as f64).min(1.0)
    }
}

/// A finished output file, ready to hand to the library
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMedia {
    pub path: PathBuf,
    pub frame_count: u64,
    /// Seconds of video written
    pub duration: f64,
    pub file_size: u64,
}

/// Terminal state of an export
#[derive(Debug)]
pub enum ExportOutcome {
    Completed(ExportedMedia),
    Failed(EditorError),
    Cancelled,
}

impl ExportOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExportOutcome::Completed(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExportOutcome::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            ExportOutcome::Completed(media) => Some(&media.path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let progress = ExportProgress { frames_done: 75, total_frames: 300 };
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(ExportProgress::default().fraction(), 0.0);
    }
}
