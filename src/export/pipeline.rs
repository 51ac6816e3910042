use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::error::{EditorError, Result};
use crate::export::job::{ExportJob, ExportOutcome, ExportProgress, ExportedMedia};
use crate::export::output::PartialOutput;
use crate::video::backend::{DecoderBackend, EncodeSettings, EncoderBackend, MediaBackends};
use crate::video::source::FrameSource;

/// Full-throughput decode, filter and re-encode of one asset into a file
///
/// Each export opens its own decode handle, so exports can run while a preview of the
/// same asset is playing. Frames are encoded in the order the source yields them and
/// none are dropped or duplicated; the source audio is copied through untouched.
#[derive(Clone)]
pub struct ExportPipeline {
    decoder: Arc<dyn DecoderBackend>,
    encoder: Arc<dyn EncoderBackend>,
    config: ExportConfig,
}

/// Control surface of a running export
pub struct ExportHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<ExportProgress>,
    task: JoinHandle<ExportOutcome>,
}

impl ExportHandle {
    /// Ask the export to stop; it checks between frames and leaves no output behind
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> watch::Receiver<ExportProgress> {
        self.progress.clone()
    }

    /// Wait for the terminal outcome
    pub async fn outcome(self) -> ExportOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => ExportOutcome::Failed(EditorError::generic(format!("export task failed: {}", e))),
        }
    }
}

impl ExportPipeline {
    pub fn new(decoder: Arc<dyn DecoderBackend>, encoder: Arc<dyn EncoderBackend>, config: ExportConfig) -> Self {
        Self { decoder, encoder, config }
    }

    /// Pipeline with backends picked from the job's source and destination paths
    pub fn for_job(backends: &MediaBackends, job: &ExportJob, config: ExportConfig) -> Self {
        Self::new(
            backends.decoder_for(&job.asset.uri),
            backends.encoder_for(&job.destination),
            config,
        )
    }

    /// Start exporting on the blocking pool; requires a Tokio runtime
    pub fn start(&self, job: ExportJob) -> ExportHandle {
        self.start_with(job, CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancel` fires
    pub fn start_with(&self, job: ExportJob, cancel: CancellationToken) -> ExportHandle {
        let total_frames = job.asset.frame_count;
        let (progress_tx, progress_rx) = watch::channel(ExportProgress { frames_done: 0, total_frames });

        let pipeline = self.clone();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.run_blocking(job, &token, &progress_tx));

        ExportHandle {
            cancel,
            progress: progress_rx,
            task,
        }
    }

    /// Export and wait for the outcome
    pub async fn run(&self, job: ExportJob) -> ExportOutcome {
        self.start(job).outcome().await
    }

    fn run_blocking(
        &self,
        job: ExportJob,
        cancel: &CancellationToken,
        progress: &watch::Sender<ExportProgress>,
    ) -> ExportOutcome {
        let started = Instant::now();
        info!("🎬 Exporting {} with [{}] to {:?}", job.asset.file_name(), job.chain, job.destination);

        let output = match PartialOutput::new(&job.destination) {
            Ok(output) => output,
            Err(e) => {
                error!("Export destination unusable: {}", e);
                return ExportOutcome::Failed(e);
            }
        };

        match self.encode_all(&job, &output, cancel, progress) {
            Ok(Some(frame_count)) => match output.commit() {
                Ok(path) => {
                    let file_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    let duration = job.asset.frame_rate.timestamp_of(frame_count);
                    info!(
                        "✅ Export finished: {} frames, {:.2}s, {} bytes in {:.1?}",
                        frame_count,
                        duration,
                        file_size,
                        started.elapsed()
                    );
                    ExportOutcome::Completed(ExportedMedia { path, frame_count, duration, file_size })
                }
                Err(e) => {
                    error!("Could not move export into place: {}", e);
                    ExportOutcome::Failed(e)
                }
            },
            Ok(None) => {
                info!("Export of {} cancelled", job.asset.file_name());
                ExportOutcome::Cancelled
            }
            Err(e) => {
                error!("Export of {} failed: {}", job.asset.file_name(), e);
                ExportOutcome::Failed(e)
            }
        }
    }

    /// Encode every frame into the partial file; `None` when cancelled
    fn encode_all(
        &self,
        job: &ExportJob,
        output: &PartialOutput,
        cancel: &CancellationToken,
        progress: &watch::Sender<ExportProgress>,
    ) -> Result<Option<u64>> {
        let asset = &job.asset;
        let mut source = FrameSource::open(self.decoder.clone(), asset.clone())?;

        let settings = EncodeSettings {
            output: output.path().to_path_buf(),
            width: asset.width,
            height: asset.height,
            frame_rate: asset.frame_rate,
            audio_source: (self.config.keep_audio && asset.has_audio).then(|| asset.uri.clone()),
            codec: self.config.codec.clone(),
            quality: self.config.quality,
        };
        debug!("Encoding with {} backend into {:?}", self.encoder.name(), settings.output);
        let mut encoder = self.encoder.create(&settings)?;

        let mut written = 0u64;
        let mut last_timestamp = f64::NEG_INFINITY;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let Some(frame) = source.next_frame()? else { break };

            if frame.timestamp() < last_timestamp {
                warn!(
                    "Dropping out-of-order frame {} ({:.3}s < {:.3}s)",
                    frame.index(),
                    frame.timestamp(),
                    last_timestamp
                );
                continue;
            }
            last_timestamp = frame.timestamp();

            encoder.write_frame(&job.chain.apply(&frame))?;
            written += 1;
            progress.send_replace(ExportProgress {
                frames_done: written,
                total_frames: asset.frame_count,
            });
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }
        if written != asset.frame_count {
            warn!("Source announced {} frames but yielded {}", asset.frame_count, written);
        }

        encoder.finish()?;
        Ok(Some(written))
    }
}
