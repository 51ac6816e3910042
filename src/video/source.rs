use std::sync::Arc;

use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::video::backend::{DecoderBackend, FrameDecoder};
use crate::video::types::{Frame, MediaAsset};

/// Lazy, time-ordered frames of one asset over an exclusively owned decode handle
///
/// The sequence only moves forward. `seek` is the single random-access operation and
/// repositions to the last decodable frame at or before the requested time. A decode
/// failure poisons the source: every later read returns a `DecodeError` until the
/// next successful seek.
pub struct FrameSource {
    asset: MediaAsset,
    backend: Arc<dyn DecoderBackend>,
    decoder: Box<dyn FrameDecoder>,
    /// Frame read ahead by `frame_at` but not yet handed out
    pending: Option<Frame>,
    /// Last frame handed out
    last: Option<Frame>,
    failed: Option<String>,
}

impl FrameSource {
    pub fn open(backend: Arc<dyn DecoderBackend>, asset: MediaAsset) -> Result<Self> {
        let decoder = backend.open(&asset, 0)?;
        Ok(Self {
            asset,
            backend,
            decoder,
            pending: None,
            last: None,
            failed: None,
        })
    }

    pub fn asset(&self) -> &MediaAsset {
        &self.asset
    }

    /// Timestamp of the last frame handed out
    pub fn position(&self) -> Option<f64> {
        self.last.as_ref().map(|frame| frame.timestamp())
    }

    /// Next frame in presentation order, `None` once the asset is exhausted
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            self.last = Some(frame.clone());
            return Ok(Some(frame));
        }
        let frame = self.read_decoder()?;
        if let Some(frame) = frame.as_ref() {
            self.last = Some(frame.clone());
        }
        Ok(frame)
    }

    fn read_decoder(&mut self) -> Result<Option<Frame>> {
        if let Some(reason) = self.failed.as_ref() {
            return Err(DecodeError::DecoderFailed {
                reason: format!("source failed earlier: {}", reason),
            }
            .into());
        }
        match self.decoder.next_frame() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.failed = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Reposition to the last decodable frame at or before `timestamp`
    ///
    /// Times past the end clamp to the last frame, negative times to the first.
    pub fn seek(&mut self, timestamp: f64) -> Result<()> {
        let last_index = self.asset.frame_count.saturating_sub(1);
        let index = self.asset.frame_rate.index_at(timestamp).min(last_index);

        debug!("Seeking {:?} to {:.3}s (frame {})", self.asset.uri, timestamp, index);

        self.decoder = self.backend.open(&self.asset, index)?;
        self.pending = None;
        self.last = None;
        self.failed = None;
        Ok(())
    }

    /// The frame on screen at `timestamp`: the latest frame not after it
    ///
    /// Reads forward, dropping frames that are already in the past. Going backwards,
    /// or jumping further ahead than `max_skip` seconds, seeks instead. Returns `None`
    /// only when the asset holds no frames at all.
    pub fn frame_at(&mut self, timestamp: f64, max_skip: f64) -> Result<Option<Frame>> {
        let interval = self.asset.frame_interval();
        let current = self.last.as_ref().map(|f| f.timestamp());

        let needs_seek = match current {
            Some(now) => timestamp + 1e-9 < now || timestamp - now > max_skip.max(interval),
            None => self.pending.is_none() && timestamp > max_skip.max(interval),
        };
        if needs_seek {
            self.seek(timestamp)?;
        }

        if self.last.is_none() {
            if self.next_frame()?.is_none() {
                return Ok(None);
            }
        }

        loop {
            if self.pending.is_none() {
                self.pending = self.read_decoder()?;
            }
            match self.pending.as_ref() {
                Some(next) if next.timestamp() <= timestamp + 1e-9 => {
                    self.next_frame()?;
                }
                _ => break,
            }
        }

        Ok(self.last.clone())
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
