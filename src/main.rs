use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snapreel::{
    config::Config,
    export::ExportOutcome,
    filters::{FilterCatalog, FilterRegistry},
    library::DirectoryLibrary,
    preview::Settled,
    session::{format_timecode, EditorSession},
    video::{FrameSource, MediaBackends},
};

#[derive(Parser)]
#[command(
    name = "snapreel",
    version,
    about = "Preview and export filtered videos",
    long_about = "Snapreel applies photo-style filters to short videos: list the filter catalog, render filter thumbnails, take headless preview snapshots, and export or save a filtered copy with the original audio."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the filter catalog
    Filters,

    /// Print media information as JSON
    Probe {
        input: PathBuf,
    },

    /// Export a filtered copy of a video
    Export {
        input: PathBuf,
        output: PathBuf,

        /// Catalog filter to apply (none for an unfiltered re-encode)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Render preview snapshots (foreground and background layer) as PNG files
    Preview {
        input: PathBuf,

        #[arg(short, long)]
        filter: Option<String>,

        /// Times to capture, in seconds
        #[arg(long = "at", value_delimiter = ',', default_value = "0")]
        times: Vec<f64>,

        #[arg(short, long, default_value = "preview")]
        out_dir: PathBuf,
    },

    /// Render one frame under every catalog filter
    Thumbnails {
        input: PathBuf,

        /// Time of the frame to render, in seconds
        #[arg(long, default_value_t = 0.0)]
        at: f64,

        /// Longest side of each thumbnail
        #[arg(long, default_value_t = 160)]
        size: u32,

        #[arg(short, long, default_value = "thumbnails")]
        out_dir: PathBuf,
    },

    /// Export with a filter and hand the result to the library directory
    SaveCopy {
        input: PathBuf,

        #[arg(short, long)]
        filter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Snapreel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match cli.config.as_ref() {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    config.validate()?;

    config
        .video
        .thread_pool_builder()
        .build_global()
        .context("could not start filter threads")?;
    info!("Filtering on {} threads", config.video.filter_threads);

    match cli.command {
        Command::Filters => list_filters(&config),
        Command::Probe { input } => probe(&config, &input),
        Command::Export { input, output, filter } => export(config, &input, output, filter).await,
        Command::Preview { input, filter, times, out_dir } => preview(config, &input, filter, &times, &out_dir).await,
        Command::Thumbnails { input, at, size, out_dir } => thumbnails(&config, &input, at, size, &out_dir),
        Command::SaveCopy { input, filter } => save_copy(config, &input, &filter).await,
    }
}

fn list_filters(config: &Config) -> Result<()> {
    let catalog = FilterCatalog::from_config(&FilterRegistry::new(), &config.filters)?;
    for index in 0..catalog.len() {
        let filter = catalog.get(index)?;
        println!("{:>2}  {:<10} {}", index, filter.name(), filter.description());
    }
    Ok(())
}

fn probe(config: &Config, input: &Path) -> Result<()> {
    let asset = MediaBackends::new(&config.video).probe(input)?;
    println!("{}", serde_json::to_string_pretty(&asset)?);
    Ok(())
}

fn open_editor(config: Config, input: &Path, filter: Option<&str>) -> Result<EditorSession> {
    let mut editor = EditorSession::open(config, input)
        .with_context(|| format!("could not open {:?}", input))?;
    if let Some(name) = filter {
        editor.select_filter_named(name)?;
    }
    Ok(editor)
}

async fn export(config: Config, input: &Path, output: PathBuf, filter: Option<String>) -> Result<()> {
    let editor = open_editor(config, input, filter.as_deref())?;
    let handle = editor.export(&output);

    // Ctrl-C stops the export between frames
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling export");
            token.cancel();
        }
    });

    let mut progress = handle.progress();
    let reporter = tokio::spawn(async move {
        let mut last_decile = 0;
        while progress.changed().await.is_ok() {
            let fraction = progress.borrow().fraction();
            let decile = (fraction * 10.0) as u32;
            if decile > last_decile {
                last_decile = decile;
                info!("   {:>3.0}%", fraction * 100.0);
            }
        }
    });

    let outcome = handle.outcome().await;
    reporter.abort();

    match outcome {
        ExportOutcome::Completed(media) => {
            info!(
                "🎉 Saved {:?} ({} frames, {})",
                media.path,
                media.frame_count,
                format_timecode(media.duration)
            );
            Ok(())
        }
        ExportOutcome::Cancelled => {
            warn!("Export cancelled, nothing was written");
            Ok(())
        }
        ExportOutcome::Failed(e) => {
            let message = e.user_message();
            Err(anyhow::Error::new(e).context(message))
        }
    }
}

async fn preview(
    config: Config,
    input: &Path,
    filter: Option<String>,
    times: &[f64],
    out_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let mut editor = open_editor(config, input, filter.as_deref())?;
    editor.start_preview()?;
    editor.pause()?;

    let preview = editor.preview().context("preview did not start")?;

    for &time in times {
        let generation = preview.snapshot().generation + 1;
        preview.seek(time)?;

        let settled = tokio::time::timeout(Duration::from_secs(30), preview.settle(generation))
            .await
            .context("timed out waiting for preview frame")??;
        let shown = match settled {
            Settled::Shown(shown) => shown,
            Settled::Failed(error) => {
                warn!("Preview error at {:.2}s: {}", time, error);
                continue;
            }
        };

        for (layer, frame) in [("fg", shown.foreground), ("bg", shown.background)] {
            if let Some(frame) = frame {
                let path = out_dir.join(format!("preview-{:08.3}-{}.png", time, layer));
                frame.save_png(&path)?;
                info!("Wrote {:?} ({})", path, format_timecode(frame.timestamp()));
            }
        }
    }

    editor.close().await;
    Ok(())
}

fn thumbnails(config: &Config, input: &Path, at: f64, size: u32, out_dir: &Path) -> Result<()> {
    let backends = MediaBackends::new(&config.video);
    let asset = backends.probe(input)?;
    let mut source = FrameSource::open(backends.decoder_for(input), asset)?;
    source.seek(at)?;
    let frame = source.next_frame()?.context("video has no frames")?;

    let catalog = FilterCatalog::from_config(&FilterRegistry::new(), &config.filters)?;
    std::fs::create_dir_all(out_dir)?;
    for thumb in catalog.thumbnails(&frame, size) {
        let path = out_dir.join(format!("{:02}-{}.png", thumb.index, thumb.name));
        thumb.frame.save_png(&path)?;
    }
    info!("Wrote {} thumbnails to {:?}", catalog.len(), out_dir);
    Ok(())
}

async fn save_copy(config: Config, input: &Path, filter: &str) -> Result<()> {
    let library = DirectoryLibrary::from_config(&config.library);
    let editor = open_editor(config, input, Some(filter))?;
    let saved = editor.save_copy(&library).await.map_err(|e| {
        let message = e.user_message();
        anyhow::Error::new(e).context(message)
    })?;
    info!("🎉 Saved copy to {:?}", saved.location);
    Ok(())
}
