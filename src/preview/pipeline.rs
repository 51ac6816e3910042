use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle as ThreadHandle;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PreviewConfig;
use crate::error::{EditorError, Result};
use crate::filters::{BlurFilter, FilterChain, SharedChain};
use crate::preview::worker::{spawn_worker, Layer, RenderResult, WorkerLink, WorkerOptions};
use crate::video::backend::DecoderBackend;
use crate::video::source::FrameSource;
use crate::video::types::{Frame, MediaAsset};

/// What the UI shows for the position slider and time label
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    /// Current playback time in seconds
    pub position: f64,
    pub duration: f64,
    /// 1.0 while playing, 0.0 while paused
    pub rate: f64,
    pub playing: bool,
    /// Set when a layer failed to decode; the last good frame stays on screen
    pub error: Option<String>,
    /// Bumped by every seek, chain change and rewind
    pub generation: u64,
}

/// The two layers currently on screen
#[derive(Debug, Clone, Default)]
pub struct PreviewFrame {
    pub foreground: Option<Arc<Frame>>,
    /// Same frame through the chain and the fixed background blur
    pub background: Option<Arc<Frame>>,
    /// Generation each layer was rendered in, foreground first
    pub rendered: [Option<u64>; 2],
    pub generation: u64,
}

impl PreviewFrame {
    /// Both layers were rendered after the latest seek or chain change
    pub fn is_complete(&self) -> bool {
        self.rendered == [Some(self.generation); 2]
    }
}

/// How the preview ended up after a seek or chain change
#[derive(Debug, Clone)]
pub enum Settled {
    /// Both layers rendered
    Shown(PreviewFrame),
    /// A layer failed; the previous frame stays on screen
    Failed(String),
}

#[derive(Debug)]
enum PreviewCommand {
    Play,
    Pause,
    Seek(f64),
    SetChain(SharedChain),
    Retry,
    Shutdown,
}

/// Live, seekable rendering of an asset through a filter chain
///
/// A clock task on the Tokio runtime advances the playback position at the display
/// refresh rate and asks two worker threads for the frame at that position. Each worker
/// owns a separate decode handle: the foreground renders through the chain, the
/// background through the chain followed by a fixed-radius blur.
pub struct PreviewPipeline;

impl PreviewPipeline {
    /// Open both layers and start the clock, paused at 0; requires a Tokio runtime
    pub fn spawn(
        backend: Arc<dyn DecoderBackend>,
        asset: MediaAsset,
        chain: SharedChain,
        config: &PreviewConfig,
    ) -> Result<PreviewHandle> {
        let options = WorkerOptions {
            max_skip: config.max_skip_frames as f64 * asset.frame_interval(),
            max_dimension: config.max_dimension,
        };

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let mut links = Vec::new();
        let mut threads = Vec::new();
        for layer in [Layer::Foreground, Layer::Background] {
            let source = FrameSource::open(backend.clone(), asset.clone())?;
            let (requests_tx, requests_rx) = std_mpsc::channel();
            threads.push(spawn_worker(layer, source, requests_rx, results_tx.clone(), options)?);
            links.push(WorkerLink { layer, requests: requests_tx });
        }

        let initial = PlaybackStatus {
            position: 0.0,
            duration: asset.duration,
            rate: 0.0,
            playing: false,
            error: None,
            generation: 0,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (frames_tx, frames_rx) = watch::channel(PreviewFrame::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        info!(
            "Preview of {} started: {} fps source, {} Hz clock, background blur {}",
            asset.file_name(),
            asset.frame_rate,
            config.display_hz,
            config.background_blur_radius
        );

        let blur = BlurFilter::new(config.background_blur_radius);
        let clock = Clock::new(asset, chain, blur, config.loop_playback, links, status_tx, frames_tx);
        let tick = Duration::from_secs_f64(1.0 / config.display_hz.max(1) as f64);
        let task = tokio::spawn(clock.run(tick, commands_rx, results_rx, threads));

        Ok(PreviewHandle {
            commands: commands_tx,
            status: status_rx,
            frames: frames_rx,
            task,
        })
    }
}

/// Control surface of a running preview
pub struct PreviewHandle {
    commands: mpsc::UnboundedSender<PreviewCommand>,
    status: watch::Receiver<PlaybackStatus>,
    frames: watch::Receiver<PreviewFrame>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    fn send(&self, command: PreviewCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| EditorError::generic("preview pipeline has stopped"))
    }

    pub fn play(&self) -> Result<()> {
        self.send(PreviewCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PreviewCommand::Pause)
    }

    /// Jump to `timestamp`, keeping the play/pause state
    pub fn seek(&self, timestamp: f64) -> Result<()> {
        self.send(PreviewCommand::Seek(timestamp))
    }

    /// Swap the chain; the next rendered frame uses it, position and playback are kept
    pub fn set_filter_chain(&self, chain: SharedChain) -> Result<()> {
        self.send(PreviewCommand::SetChain(chain))
    }

    /// Clear a decode error and render the current position again
    pub fn retry(&self) -> Result<()> {
        self.send(PreviewCommand::Retry)
    }

    pub fn status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    pub fn frames(&self) -> watch::Receiver<PreviewFrame> {
        self.frames.clone()
    }

    /// Copy of the latest status
    pub fn snapshot(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    pub fn current_time(&self) -> f64 {
        self.status.borrow().position
    }

    pub fn duration(&self) -> f64 {
        self.status.borrow().duration
    }

    /// Wait until both layers show `generation` or later, or a layer reports an error
    pub async fn settle(&self, generation: u64) -> Result<Settled> {
        let mut frames = self.frames.clone();
        let mut status = self.status.clone();
        let stopped = |_| EditorError::generic("preview stopped");

        tokio::select! {
            shown = frames.wait_for(|f| f.generation >= generation && f.is_complete()) => {
                Ok(Settled::Shown(shown.map_err(stopped)?.clone()))
            }
            failed = status.wait_for(|s| s.generation >= generation && s.error.is_some()) => {
                let failed = failed.map_err(stopped)?;
                Ok(Settled::Failed(failed.error.clone().unwrap_or_default()))
            }
        }
    }

    /// Stop the clock and both workers
    pub async fn shutdown(self) {
        let _ = self.commands.send(PreviewCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Preview clock ended abnormally: {}", e);
        }
    }
}

/// Where the clock ends up after advancing
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Advance {
    Running(f64),
    /// Ran past the end and started over at the given position
    Looped(f64),
    Finished,
}

pub(crate) fn advance(position: f64, elapsed: f64, duration: f64, looping: bool) -> Advance {
    let next = position + elapsed;
    if next < duration {
        Advance::Running(next)
    } else if looping && duration > 0.0 {
        Advance::Looped(next % duration)
    } else {
        Advance::Finished
    }
}

struct Clock {
    asset: MediaAsset,
    foreground_chain: SharedChain,
    background_chain: SharedChain,
    blur: BlurFilter,
    looping: bool,
    links: Vec<WorkerLink>,
    status: watch::Sender<PlaybackStatus>,
    frames: watch::Sender<PreviewFrame>,

    position: f64,
    playing: bool,
    generation: u64,
    error: Option<String>,
    last_tick: Instant,
    /// Frame index last requested in this generation
    requested: Option<u64>,
    /// Timestamp last presented per layer in this generation
    presented: [Option<f64>; 2],
    current: [Option<Arc<Frame>>; 2],
    rendered: [Option<u64>; 2],
}

impl Clock {
    fn new(
        asset: MediaAsset,
        chain: SharedChain,
        blur: BlurFilter,
        looping: bool,
        links: Vec<WorkerLink>,
        status: watch::Sender<PlaybackStatus>,
        frames: watch::Sender<PreviewFrame>,
    ) -> Self {
        let background_chain = Arc::new(chain.then(Arc::new(blur)));
        Self {
            asset,
            foreground_chain: chain,
            background_chain,
            blur,
            looping,
            links,
            status,
            frames,
            position: 0.0,
            playing: false,
            generation: 0,
            error: None,
            last_tick: Instant::now(),
            requested: None,
            presented: [None, None],
            current: [None, None],
            rendered: [None, None],
        }
    }

    async fn run(
        mut self,
        tick: Duration,
        mut commands: mpsc::UnboundedReceiver<PreviewCommand>,
        mut results: mpsc::UnboundedReceiver<RenderResult>,
        threads: Vec<ThreadHandle<()>>,
    ) {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.request_render();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(PreviewCommand::Shutdown) => break,
                    Some(command) => self.handle(command),
                },
                _ = ticker.tick() => self.tick(),
                Some(result) = results.recv() => self.accept(result),
            }
        }

        // Workers exit once their request channels close
        self.links.clear();
        drop(results);
        let joined = tokio::task::spawn_blocking(move || {
            for thread in threads {
                let _ = thread.join();
            }
        })
        .await;
        if joined.is_err() {
            warn!("Could not join preview workers");
        }
        info!("Preview of {} stopped", self.asset.file_name());
    }

    fn handle(&mut self, command: PreviewCommand) {
        debug!("Preview command: {:?}", command);
        match command {
            PreviewCommand::Play => {
                self.playing = true;
                self.last_tick = Instant::now();
            }
            PreviewCommand::Pause => {
                self.playing = false;
            }
            PreviewCommand::Seek(timestamp) => {
                self.position = timestamp.clamp(0.0, self.asset.duration.max(0.0));
                self.error = None;
                self.last_tick = Instant::now();
                self.restart_generation();
                info!("Preview seeked to {:.3}s", self.position);
            }
            PreviewCommand::SetChain(chain) => {
                info!("Preview filter chain set to [{}]", chain);
                self.background_chain = Arc::new(chain.then(Arc::new(self.blur)));
                self.foreground_chain = chain;
                self.restart_generation();
            }
            PreviewCommand::Retry => {
                self.error = None;
                self.restart_generation();
            }
            PreviewCommand::Shutdown => {}
        }
        self.publish_status();
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        match advance(self.position, elapsed, self.asset.duration, self.looping) {
            Advance::Running(position) => {
                self.position = position;
                self.request_render();
            }
            Advance::Looped(position) => {
                debug!("Preview looped");
                self.position = position;
                self.restart_generation();
            }
            Advance::Finished => {
                info!("Preview reached the end, rewinding");
                self.playing = false;
                self.position = 0.0;
                self.restart_generation();
            }
        }
        self.publish_status();
    }

    /// Forget in-flight renders and render the current position again
    fn restart_generation(&mut self) {
        self.generation += 1;
        self.requested = None;
        self.presented = [None, None];
        self.request_render();
    }

    fn request_render(&mut self) {
        let index = self.asset.frame_rate.index_at(self.position);
        if self.requested == Some(index) {
            return;
        }
        self.requested = Some(index);

        for link in &self.links {
            let chain = match link.layer {
                Layer::Foreground => &self.foreground_chain,
                Layer::Background => &self.background_chain,
            };
            link.request(self.position, self.generation, chain);
        }
    }

    fn accept(&mut self, result: RenderResult) {
        if result.generation != self.generation {
            debug!("Dropping stale {} frame from generation {}", result.layer, result.generation);
            return;
        }

        let frame = match result.outcome {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                // Keep the last good frame on screen and pause until retried
                self.error = Some(e.user_message());
                self.playing = false;
                self.publish_status();
                return;
            }
        };

        let slot = result.layer.slot();
        if let Some(shown) = self.presented[slot] {
            if frame.timestamp() < shown {
                debug!("Dropping out-of-order {} frame at {:.3}s", result.layer, frame.timestamp());
                return;
            }
        }
        self.presented[slot] = Some(frame.timestamp());
        self.current[slot] = Some(Arc::new(frame));
        self.rendered[slot] = Some(self.generation);

        self.frames.send_replace(PreviewFrame {
            foreground: self.current[0].clone(),
            background: self.current[1].clone(),
            rendered: self.rendered,
            generation: self.generation,
        });
    }

    fn publish_status(&self) {
        self.status.send_replace(PlaybackStatus {
            position: self.position,
            duration: self.asset.duration,
            rate: if self.playing { 1.0 } else { 0.0 },
            playing: self.playing,
            error: self.error.clone(),
            generation: self.generation,
        });
    }
}

/// Preview and export share this when no filter is selected
pub fn unfiltered() -> SharedChain {
    Arc::new(FilterChain::identity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::color::{invert, sepia};
    use crate::filters::Filter;
    use crate::video::raw::RawBackend;
    use crate::video::testing::{truncate_clip_at, write_clip};
    use crate::video::types::FrameRate;
    use std::path::Path;
    use tempfile::tempdir;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> PreviewConfig {
        PreviewConfig {
            background_blur_radius: 2,
            ..PreviewConfig::default()
        }
    }

    fn clip(dir: &Path, frames: u64) -> MediaAsset {
        let path = dir.join("clip.sraw");
        write_clip(&path, 8, 6, FrameRate::new(30, 1), frames);
        RawBackend::new().probe(&path).unwrap()
    }

    fn source_frame(asset: &MediaAsset, index: u64) -> Frame {
        let mut source = FrameSource::open(Arc::new(RawBackend::new()), asset.clone()).unwrap();
        source.seek(asset.frame_rate.timestamp_of(index)).unwrap();
        source.next_frame().unwrap().unwrap()
    }

    fn spawn(asset: &MediaAsset, chain: SharedChain, config: &PreviewConfig) -> PreviewHandle {
        PreviewPipeline::spawn(Arc::new(RawBackend::new()), asset.clone(), chain, config).unwrap()
    }

    async fn wait_frame(
        rx: &mut watch::Receiver<PreviewFrame>,
        mut pred: impl FnMut(&PreviewFrame) -> bool,
    ) -> PreviewFrame {
        timeout(WAIT, rx.wait_for(|f| f.is_complete() && pred(f)))
            .await
            .expect("timed out waiting for a frame")
            .expect("preview stopped")
            .clone()
    }

    async fn wait_status(
        rx: &mut watch::Receiver<PlaybackStatus>,
        pred: impl FnMut(&PlaybackStatus) -> bool,
    ) -> PlaybackStatus {
        timeout(WAIT, rx.wait_for(pred))
            .await
            .expect("timed out waiting for status")
            .expect("preview stopped")
            .clone()
    }

    #[tokio::test]
    async fn test_first_frame_renders_both_layers() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        let chain: SharedChain = Arc::new(FilterChain::single(Arc::new(sepia(1.0))));
        let preview = spawn(&asset, chain.clone(), &test_config());

        let shown = wait_frame(&mut preview.frames(), |_| true).await;
        let original = source_frame(&asset, 0);

        assert_eq!(*shown.foreground.unwrap(), chain.apply(&original));
        let background = chain.then(Arc::new(BlurFilter::new(2)));
        assert_eq!(*shown.background.unwrap(), background.apply(&original));
        assert!(!preview.status().borrow().playing);
        assert!((preview.duration() - 1.0).abs() < 1e-9);

        preview.shutdown().await;
    }

    #[tokio::test]
    async fn test_chain_swap_keeps_position() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        let preview = spawn(&asset, unfiltered(), &test_config());
        let mut frames = preview.frames();

        preview.seek(0.5).unwrap();
        wait_frame(&mut frames, |f| f.generation == 1).await;

        let inverted: SharedChain = Arc::new(FilterChain::single(Arc::new(invert())));
        preview.set_filter_chain(inverted).unwrap();
        let shown = wait_frame(&mut frames, |f| f.generation == 2).await;

        assert_eq!(*shown.foreground.unwrap(), invert().apply(&source_frame(&asset, 15)));
        assert_eq!(preview.current_time(), 0.5);

        preview.shutdown().await;
    }

    #[tokio::test]
    async fn test_seek_shows_frame_at_or_before_target() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        let preview = spawn(&asset, unfiltered(), &test_config());
        let mut frames = preview.frames();

        preview.seek(0.52).unwrap();
        let shown = wait_frame(&mut frames, |f| f.generation == 1).await;
        let timestamp = shown.foreground.unwrap().timestamp();

        assert!(timestamp <= 0.52);
        assert!(timestamp > 0.52 - asset.frame_interval());

        preview.shutdown().await;
    }

    #[tokio::test]
    async fn test_playback_pauses_and_rewinds_at_end() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        let preview = spawn(&asset, unfiltered(), &test_config());
        let mut status = preview.status();

        preview.play().unwrap();
        let playing = wait_status(&mut status, |s| s.playing && s.position > 0.05).await;
        assert_eq!(playing.rate, 1.0);

        let ended = wait_status(&mut status, |s| !s.playing && s.generation > 0).await;
        assert_eq!(ended.position, 0.0);
        assert_eq!(ended.rate, 0.0);

        preview.shutdown().await;
    }

    #[tokio::test]
    async fn test_decode_error_freezes_and_seek_recovers() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        truncate_clip_at(&asset.uri, 8, 6, 10);
        let preview = spawn(&asset, unfiltered(), &test_config());
        let mut status = preview.status();
        let mut frames = preview.frames();

        wait_frame(&mut frames, |f| f.generation == 0).await;

        preview.seek(0.8).unwrap();
        let failed = wait_status(&mut status, |s| s.error.is_some()).await;
        assert!(!failed.playing);
        let frozen = frames.borrow().foreground.clone().unwrap();
        assert_eq!(frozen.index(), 0);

        preview.seek(0.1).unwrap();
        let recovered = wait_frame(&mut frames, |f| f.generation == 2).await;
        assert_eq!(recovered.foreground.unwrap().index(), 3);
        assert!(preview.status().borrow().error.is_none());

        preview.shutdown().await;
    }

    #[tokio::test]
    async fn test_settle_reports_layer_errors() {
        let dir = tempdir().unwrap();
        let asset = clip(dir.path(), 30);
        truncate_clip_at(&asset.uri, 8, 6, 10);
        let preview = spawn(&asset, unfiltered(), &test_config());

        match timeout(WAIT, preview.settle(0)).await.unwrap().unwrap() {
            Settled::Shown(frame) => assert_eq!(frame.foreground.unwrap().index(), 0),
            Settled::Failed(error) => panic!("first frame failed: {}", error),
        }

        preview.seek(0.8).unwrap();
        let settled = timeout(WAIT, preview.settle(1)).await.expect("settle never returned");
        assert!(matches!(settled, Ok(Settled::Failed(_))));

        preview.seek(0.1).unwrap();
        match timeout(WAIT, preview.settle(2)).await.unwrap().unwrap() {
            Settled::Shown(frame) => assert_eq!(frame.foreground.unwrap().index(), 3),
            Settled::Failed(error) => panic!("seek did not recover: {}", error),
        }

        preview.shutdown().await;
    }

    #[test]
    fn test_advance_positions() {
        assert_eq!(advance(0.2, 0.1, 1.0, false), Advance::Running(0.30000000000000004));
        assert_eq!(advance(0.95, 0.1, 1.0, false), Advance::Finished);
        match advance(0.95, 0.1, 1.0, true) {
            Advance::Looped(p) => assert!((p - 0.05).abs() < 1e-9),
            other => panic!("expected loop, got {:?}", other),
        }
        assert_eq!(advance(0.0, 0.1, 0.0, true), Advance::Finished);
    }
}
