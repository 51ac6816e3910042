//! # Editing Session
//!
//! [`PlaybackSession`] is the single source of truth for what the editor UI shows. UI
//! events go through [`PlaybackSession::reduce`], a pure transition function that returns
//! the next state plus the side effects to perform. [`EditorSession`] performs those
//! effects against the preview pipeline and owns the export entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EditorError, PermissionError, Result, StorageError};
use crate::export::{ExportHandle, ExportJob, ExportOutcome, ExportPipeline};
use crate::filters::{FilterCatalog, FilterChain, FilterRegistry, FilterSelection, SharedChain};
use crate::library::{PermissionStatus, PhotoLibrary, SavedItem};
use crate::preview::{PreviewHandle, PreviewPipeline};
use crate::video::{MediaAsset, MediaBackends, RAW_EXTENSION};

/// Something that happened in the UI or the preview pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SelectFilter(usize),
    ResetFilter,
    Play,
    Pause,
    TogglePlayback,
    Seek(f64),
    /// Position report from the preview clock
    PlaybackProgress { position: f64, playing: bool },
    PreviewFailed(String),
    Retry,
}

/// Work the reducer asks the driver to do
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    ApplySelection(FilterSelection),
    StartPlayback,
    PausePlayback,
    SeekTo(f64),
    RetryPreview,
}

/// UI-owned state of one editing screen
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub selection: FilterSelection,
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub error: Option<String>,
}

impl PlaybackSession {
    pub fn new(duration: f64) -> Self {
        Self {
            selection: FilterSelection::Unselected,
            position: 0.0,
            duration,
            playing: false,
            error: None,
        }
    }

    /// Next state and the effects that bring the pipeline in line with it
    pub fn reduce(&self, event: SessionEvent) -> (Self, Vec<SessionEffect>) {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match event {
            SessionEvent::SelectFilter(index) => {
                if let Some(selection) = self.selection.select(index) {
                    next.selection = selection;
                    effects.push(SessionEffect::ApplySelection(selection));
                    if !self.playing {
                        next.playing = true;
                        effects.push(SessionEffect::StartPlayback);
                    }
                }
            }
            SessionEvent::ResetFilter => {
                if self.selection.is_selected() {
                    next.selection = self.selection.reset();
                    effects.push(SessionEffect::ApplySelection(next.selection));
                }
            }
            SessionEvent::Play => {
                if !self.playing {
                    next.playing = true;
                    effects.push(SessionEffect::StartPlayback);
                }
            }
            SessionEvent::Pause => {
                if self.playing {
                    next.playing = false;
                    effects.push(SessionEffect::PausePlayback);
                }
            }
            SessionEvent::TogglePlayback => {
                let event = if self.playing { SessionEvent::Pause } else { SessionEvent::Play };
                return self.reduce(event);
            }
            SessionEvent::Seek(timestamp) => {
                next.position = timestamp.clamp(0.0, self.duration.max(0.0));
                next.error = None;
                effects.push(SessionEffect::SeekTo(next.position));
            }
            SessionEvent::PlaybackProgress { position, playing } => {
                next.position = position;
                next.playing = playing;
            }
            SessionEvent::PreviewFailed(message) => {
                next.error = Some(message);
                next.playing = false;
            }
            SessionEvent::Retry => {
                if self.error.is_some() {
                    next.error = None;
                    effects.push(SessionEffect::RetryPreview);
                }
            }
        }

        (next, effects)
    }

    /// Saving is offered only once a filter is picked
    pub fn can_commit(&self) -> bool {
        self.selection.is_selected()
    }

    pub fn current_time(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn position_label(&self) -> String {
        format_timecode(self.position)
    }

    pub fn duration_label(&self) -> String {
        format_timecode(self.duration)
    }
}

/// `HH:MM:SS`, truncating fractions; negative and non-finite input shows as zero
pub fn format_timecode(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// One asset opened for editing
pub struct EditorSession {
    config: Config,
    backends: MediaBackends,
    asset: MediaAsset,
    catalog: FilterCatalog,
    state: PlaybackSession,
    chain: SharedChain,
    preview: Option<PreviewHandle>,
}

impl EditorSession {
    /// Probe `path` and build the filter catalog from `config`
    pub fn open(config: Config, path: &Path) -> Result<Self> {
        let backends = MediaBackends::new(&config.video);
        let asset = backends.probe(path)?;
        let catalog = FilterCatalog::from_config(&FilterRegistry::new(), &config.filters)?;

        info!(
            "Opened {} for editing: {}x{}, {:.2}s, {} filters",
            asset.file_name(),
            asset.width,
            asset.height,
            asset.duration,
            catalog.len()
        );

        Ok(Self {
            state: PlaybackSession::new(asset.duration),
            chain: Arc::new(FilterChain::identity()),
            config,
            backends,
            asset,
            catalog,
            preview: None,
        })
    }

    pub fn asset(&self) -> &MediaAsset {
        &self.asset
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn state(&self) -> &PlaybackSession {
        &self.state
    }

    /// The chain currently previewed
    pub fn chain(&self) -> SharedChain {
        self.chain.clone()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Start the live preview with the current chain; requires a Tokio runtime
    pub fn start_preview(&mut self) -> Result<()> {
        if self.preview.is_none() {
            let backend = self.backends.decoder_for(&self.asset.uri);
            let handle = PreviewPipeline::spawn(backend, self.asset.clone(), self.chain.clone(), &self.config.preview)?;
            if self.state.playing {
                handle.play()?;
            }
            self.preview = Some(handle);
        }
        Ok(())
    }

    /// Apply an event and carry out its effects
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<()> {
        let (next, effects) = self.state.reduce(event);
        self.state = next;
        for effect in effects {
            self.perform(effect)?;
        }
        Ok(())
    }

    fn perform(&mut self, effect: SessionEffect) -> Result<()> {
        debug!("Session effect: {:?}", effect);
        if let SessionEffect::ApplySelection(selection) = effect {
            self.chain = Arc::new(self.catalog.chain_for(selection)?);
            info!("Selected filter chain [{}]", self.chain);
        }

        let Some(preview) = self.preview.as_ref() else {
            return Ok(());
        };
        match effect {
            SessionEffect::ApplySelection(_) => preview.set_filter_chain(self.chain.clone()),
            SessionEffect::StartPlayback => preview.play(),
            SessionEffect::PausePlayback => preview.pause(),
            SessionEffect::SeekTo(timestamp) => preview.seek(timestamp),
            SessionEffect::RetryPreview => preview.retry(),
        }
    }

    /// Pull the preview clock's latest position and error into the session state
    pub fn sync_from_preview(&mut self) -> Result<()> {
        let Some(status) = self.preview.as_ref().map(PreviewHandle::snapshot) else {
            return Ok(());
        };
        if let Some(message) = status.error {
            if self.state.error.as_deref() != Some(message.as_str()) {
                self.dispatch(SessionEvent::PreviewFailed(message))?;
            }
        }
        self.dispatch(SessionEvent::PlaybackProgress {
            position: status.position,
            playing: status.playing,
        })
    }

    pub fn select_filter(&mut self, index: usize) -> Result<()> {
        self.catalog.get(index)?;
        self.dispatch(SessionEvent::SelectFilter(index))
    }

    /// Select by catalog name
    pub fn select_filter_named(&mut self, name: &str) -> Result<()> {
        let index = self.catalog.position(name).ok_or_else(|| {
            EditorError::from(crate::error::FilterError::NotFound { name: name.to_string() })
        })?;
        self.select_filter(index)
    }

    pub fn reset_filter(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::ResetFilter)
    }

    pub fn play(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::Play)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.dispatch(SessionEvent::Pause)
    }

    pub fn seek(&mut self, timestamp: f64) -> Result<()> {
        self.dispatch(SessionEvent::Seek(timestamp))
    }

    /// Export the asset through the current chain; requires a Tokio runtime
    ///
    /// The job keeps the chain it started with, whatever is selected afterwards.
    pub fn export(&self, destination: impl Into<PathBuf>) -> ExportHandle {
        let job = ExportJob::new(self.asset.clone(), self.chain.clone(), destination);
        ExportPipeline::for_job(&self.backends, &job, self.config.export.clone()).start(job)
    }

    /// Export into the work directory and hand the result to `library`
    pub async fn save_copy(&self, library: &dyn PhotoLibrary) -> Result<SavedItem> {
        if library.request_permission() == PermissionStatus::Denied {
            return Err(PermissionError::Denied {
                destination: "photo library".to_string(),
            }
            .into());
        }

        let work_dir = &self.config.export.work_dir;
        std::fs::create_dir_all(work_dir).map_err(|e| StorageError::Unavailable {
            path: work_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let scratch = work_dir.join(self.scratch_name());

        let media = match self.export(&scratch).outcome().await {
            ExportOutcome::Completed(media) => media,
            ExportOutcome::Failed(e) => return Err(e),
            ExportOutcome::Cancelled => return Err(EditorError::generic("export was cancelled")),
        };

        let saved = library.save(&media.path);
        if let Err(e) = std::fs::remove_file(&media.path) {
            warn!("Could not remove scratch export {:?}: {}", media.path, e);
        }
        saved
    }

    fn scratch_name(&self) -> String {
        let stem = self
            .asset
            .uri
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let ext = match self.asset.extension() {
            Some(ext) if ext.eq_ignore_ascii_case(RAW_EXTENSION) => RAW_EXTENSION,
            _ => "mp4",
        };
        let filter = self.chain.names().join("-");
        let filter = if filter.is_empty() { "original".to_string() } else { filter };
        format!("{}-{}-{}.{}", stem, filter, Local::now().format("%Y%m%d%H%M%S%3f"), ext)
    }

    /// Stop the preview, if any
    pub async fn close(mut self) {
        if let Some(preview) = self.preview.take() {
            preview.shutdown().await;
        }
    }
}
