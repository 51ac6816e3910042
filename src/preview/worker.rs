use std::fmt;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::Result;
use crate::filters::SharedChain;
use crate::video::source::FrameSource;
use crate::video::types::Frame;

/// The two independently decoded layers of the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Foreground,
    Background,
}

impl Layer {
    pub(crate) fn slot(self) -> usize {
        match self {
            Layer::Foreground => 0,
            Layer::Background => 1,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Foreground => write!(f, "foreground"),
            Layer::Background => write!(f, "background"),
        }
    }
}

/// Render the frame on screen at `timestamp` through `chain`
#[derive(Debug, Clone)]
pub(crate) struct RenderRequest {
    pub timestamp: f64,
    pub generation: u64,
    pub chain: SharedChain,
}

pub(crate) struct RenderResult {
    pub layer: Layer,
    pub generation: u64,
    /// `Ok(None)` when the asset has no frames
    pub outcome: Result<Option<Frame>>,
}

/// Settings shared by both layer workers
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerOptions {
    /// Seconds a worker may decode forward before seeking instead
    pub max_skip: f64,
    pub max_dimension: Option<u32>,
}

/// Decode and filter thread of one layer
///
/// Owns its frame source exclusively. Only the newest pending request is rendered;
/// older ones are dropped, never reordered.
pub(crate) fn spawn_worker(
    layer: Layer,
    source: FrameSource,
    requests: Receiver<RenderRequest>,
    results: UnboundedSender<RenderResult>,
    options: WorkerOptions,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("preview-{}", layer))
        .spawn(move || run_worker(layer, source, requests, results, options))
}

fn run_worker(
    layer: Layer,
    mut source: FrameSource,
    requests: Receiver<RenderRequest>,
    results: UnboundedSender<RenderResult>,
    options: WorkerOptions,
) {
    let mut failed = false;

    while let Ok(mut request) = requests.recv() {
        let mut skipped = 0;
        while let Ok(newer) = requests.try_recv() {
            request = newer;
            skipped += 1;
        }
        if skipped > 0 {
            debug!("{} worker skipped {} stale requests", layer, skipped);
        }

        let outcome = render(&mut source, &request, options, &mut failed);
        if let Err(e) = outcome.as_ref() {
            warn!("{} layer failed at {:.3}s: {}", layer, request.timestamp, e);
        }

        let result = RenderResult {
            layer,
            generation: request.generation,
            outcome,
        };
        if results.send(result).is_err() {
            break;
        }
    }

    debug!("{} worker stopped", layer);
}

fn render(
    source: &mut FrameSource,
    request: &RenderRequest,
    options: WorkerOptions,
    failed: &mut bool,
) -> Result<Option<Frame>> {
    // A failed source stays poisoned until it is repositioned
    if *failed {
        source.seek(request.timestamp)?;
        *failed = false;
    }

    let frame = match source.frame_at(request.timestamp, options.max_skip) {
        Ok(frame) => frame,
        Err(e) => {
            *failed = true;
            return Err(e);
        }
    };

    Ok(frame.map(|frame| {
        let frame = match options.max_dimension {
            Some(max) => frame.fit_within(max),
            None => frame,
        };
        request.chain.apply(&frame)
    }))
}

/// Sender side of a worker, kept by the clock
pub(crate) struct WorkerLink {
    pub layer: Layer,
    pub requests: Sender<RenderRequest>,
}

impl WorkerLink {
    pub fn request(&self, timestamp: f64, generation: u64, chain: &SharedChain) {
        let request = RenderRequest {
            timestamp,
            generation,
            chain: Arc::clone(chain),
        };
        if self.requests.send(request).is_err() {
            warn!("{} worker is gone, request dropped", self.layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::color::invert;
    use crate::filters::{Filter, FilterChain};
    use crate::video::backend::DecoderBackend;
    use crate::video::raw::RawBackend;
    use crate::video::testing::{gradient_frame, truncate_clip_at, write_clip};
    use crate::video::types::FrameRate;
    use tempfile::tempdir;

    fn open_source(path: &std::path::Path) -> FrameSource {
        let backend = Arc::new(RawBackend::new());
        let asset = backend.probe(path).unwrap();
        FrameSource::open(backend, asset).unwrap()
    }

    fn request(timestamp: f64, chain: &SharedChain) -> RenderRequest {
        RenderRequest { timestamp, generation: 0, chain: chain.clone() }
    }

    const OPTIONS: WorkerOptions = WorkerOptions { max_skip: 0.5, max_dimension: None };

    #[test]
    fn test_render_applies_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.sraw");
        write_clip(&path, 6, 4, FrameRate::new(10, 1), 10);

        let chain: SharedChain = Arc::new(FilterChain::single(Arc::new(invert())));
        let mut source = open_source(&path);
        let mut failed = false;

        let frame = render(&mut source, &request(0.35, &chain), OPTIONS, &mut failed)
            .unwrap()
            .unwrap();
        let expected = Frame::new(gradient_frame(6, 4, 3).into_image(), 3, 0.3);
        assert_eq!(frame, invert().apply(&expected));
    }

    #[test]
    fn test_render_recovers_after_seek() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.sraw");
        write_clip(&path, 6, 4, FrameRate::new(10, 1), 10);
        truncate_clip_at(&path, 6, 4, 5);

        let chain: SharedChain = Arc::new(FilterChain::identity());
        let mut source = open_source(&path);
        let mut failed = false;

        assert!(render(&mut source, &request(0.7, &chain), OPTIONS, &mut failed).is_err());
        assert!(failed);

        let frame = render(&mut source, &request(0.2, &chain), OPTIONS, &mut failed)
            .unwrap()
            .unwrap();
        assert_eq!(frame.index(), 2);
        assert!(!failed);
    }

    #[test]
    fn test_downscales_before_filtering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.sraw");
        write_clip(&path, 40, 20, FrameRate::new(10, 1), 2);

        let chain: SharedChain = Arc::new(FilterChain::identity());
        let mut source = open_source(&path);
        let options = WorkerOptions { max_skip: 0.5, max_dimension: Some(10) };

        let frame = render(&mut source, &request(0.0, &chain), options, &mut false)
            .unwrap()
            .unwrap();
        assert_eq!((frame.width(), frame.height()), (10, 5));
    }
}
