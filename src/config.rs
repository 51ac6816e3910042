use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    filters::{blur, FilterConfig, BUILTIN_FILTERS},
};

/// Main configuration for Snapreel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoder and encoder programs
    pub video: VideoConfig,

    /// Live preview settings
    pub preview: PreviewConfig,

    /// Export settings
    pub export: ExportConfig,

    /// Filter catalog
    pub filters: FiltersConfig,

    /// Where saved copies end up
    pub library: LibraryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.preview.validate()?;
        self.export.validate()?;
        self.filters.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// External programs used for non-raw media
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// `ffmpeg` executable name or path
    pub ffmpeg_path: String,

    /// `ffprobe` executable name or path
    pub ffprobe_path: String,

    /// Worker threads for per-pixel filter work
    pub filter_threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            filter_threads: num_cpus::get(),
        }
    }
}

impl VideoConfig {
    /// Rayon pool sized for filter work; the binary installs it globally
    pub fn thread_pool_builder(&self) -> rayon::ThreadPoolBuilder {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.filter_threads)
            .thread_name(|i| format!("filter-{}", i))
    }

    fn validate(&self) -> Result<()> {
        if self.ffmpeg_path.trim().is_empty() {
            return Err(invalid("video.ffmpeg_path", &self.ffmpeg_path).into());
        }
        if self.ffprobe_path.trim().is_empty() {
            return Err(invalid("video.ffprobe_path", &self.ffprobe_path).into());
        }
        if self.filter_threads == 0 {
            return Err(invalid("video.filter_threads", self.filter_threads).into());
        }
        Ok(())
    }
}

/// Live preview configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Display refresh rate the clock ticks at (Hz)
    pub display_hz: u32,

    /// Blur radius of the background layer, independent of the selected filter
    pub background_blur_radius: u32,

    /// Start over instead of pausing at the end
    pub loop_playback: bool,

    /// Downscale preview frames so neither side exceeds this
    pub max_dimension: Option<u32>,

    /// Frames a worker may decode and drop to catch up before it seeks instead
    pub max_skip_frames: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            display_hz: 60,
            background_blur_radius: 100,
            loop_playback: false,
            max_dimension: None,
            max_skip_frames: 12,
        }
    }
}

impl PreviewConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=240).contains(&self.display_hz) {
            return Err(invalid("preview.display_hz", self.display_hz).into());
        }
        if self.max_dimension == Some(0) {
            return Err(invalid("preview.max_dimension", 0).into());
        }
        if self.background_blur_radius > blur::MAX_RADIUS {
            return Err(invalid("preview.background_blur_radius", self.background_blur_radius).into());
        }
        Ok(())
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Video codec handed to ffmpeg
    pub codec: String,

    /// Output quality (0-100), mapped onto the encoder's CRF scale
    pub quality: u8,

    /// Copy the source audio track into the output
    pub keep_audio: bool,

    /// Scratch directory for exports that are handed to the library afterwards
    pub work_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            quality: 85,
            keep_audio: true,
            work_dir: std::env::temp_dir().join("snapreel"),
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(invalid("export.quality", self.quality).into());
        }
        if self.codec.trim().is_empty() {
            return Err(invalid("export.codec", &self.codec).into());
        }
        Ok(())
    }
}

/// The filter catalog: which filters, in which order, tuned how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Filter names in catalog order
    pub catalog: Vec<String>,

    /// Per-filter parameters; filters without an entry use the defaults
    pub params: HashMap<String, FilterConfig>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            catalog: BUILTIN_FILTERS.iter().map(|s| s.to_string()).collect(),
            params: HashMap::new(),
        }
    }
}

impl FiltersConfig {
    fn validate(&self) -> Result<()> {
        for (name, params) in &self.params {
            if !(0.0..=1.0).contains(&params.intensity) {
                return Err(invalid(&format!("filters.params.{}.intensity", name), params.intensity).into());
            }
        }
        Ok(())
    }
}

/// Directory-backed stand-in for the photo library
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub directory: PathBuf,

    /// Whether the user has allowed saving into the library
    pub access_granted: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("library"),
            access_granted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.preview.background_blur_radius, 100);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original = Config::default();
        original.export.quality = 60;
        original.filters.params.insert(
            "vignette".to_string(),
            FilterConfig::with_intensity(0.4).set("radius", 0.3),
        );

        original.save_to_file(&file_path).unwrap();
        let loaded = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded.export.quality, 60);
        assert_eq!(loaded.filters.catalog, original.filters.catalog);
        assert_eq!(loaded.filters.params["vignette"].get_f32("radius"), Some(0.3));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[preview]\nloop_playback = true\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert!(config.preview.loop_playback);
        assert_eq!(config.preview.display_hz, 60);
        assert_eq!(config.export.codec, "libx264");
    }

    #[test]
    fn test_invalid_quality() {
        let mut config = Config::default();
        config.export.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_display_rate() {
        let mut config = Config::default();
        config.preview.display_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_filter_threads_size_the_pool() {
        let mut config = Config::default();
        config.video.filter_threads = 3;

        let pool = config.video.thread_pool_builder().build().unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
    }

    #[test]
    fn test_background_blur_radius_bounded() {
        let mut config = Config::default();
        config.preview.background_blur_radius = blur::MAX_RADIUS;
        assert!(config.validate().is_ok());

        config.preview.background_blur_radius = 20_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file("/nonexistent/snapreel.toml").is_err());
    }
}
