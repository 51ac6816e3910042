use image::{imageops::FilterType, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single decoded video frame with its position in the stream
///
/// Wraps an RGB image buffer and provides the pixel accessors used by filters.
/// Frames are values: filters never modify a frame in place, they return a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
    index: u64,
    timestamp: f64,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage, index: u64, timestamp: f64) -> Self {
        Self { buffer, index, timestamp }
    }

    /// Create a frame filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer, index: 0, timestamp: 0.0 }
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(
        width: u32,
        height: u32,
        data: Vec<u8>,
        index: u64,
        timestamp: f64,
    ) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer, index, timestamp })
    }

    /// Same position in the stream, different pixels
    pub fn with_image(&self, buffer: RgbImage) -> Self {
        Self { buffer, index: self.index, timestamp: self.timestamp }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Zero-based position in the source stream
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Presentation timestamp in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let pixel = self.buffer.get_pixel(x, y);
        [pixel[0], pixel[1], pixel[2]]
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.buffer
    }

    /// Scale down so neither side exceeds `max_dimension`, keeping aspect ratio
    pub fn fit_within(&self, max_dimension: u32) -> Frame {
        let (w, h) = (self.width(), self.height());
        if w <= max_dimension && h <= max_dimension {
            return self.clone();
        }
        let scale = max_dimension as f64 / w.max(h) as f64;
        let nw = ((w as f64 * scale).round() as u32).max(1);
        let nh = ((h as f64 * scale).round() as u32).max(1);
        self.with_image(image::imageops::resize(&self.buffer, nw, nh, FilterType::Triangle))
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Rational frame rate, e.g. 30000/1001
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Length of one frame in seconds
    pub fn frame_interval(&self) -> f64 {
        self.den as f64 / self.num as f64
    }

    pub fn timestamp_of(&self, index: u64) -> f64 {
        index as f64 * self.den as f64 / self.num as f64
    }

    /// Index of the last frame whose timestamp is not after `seconds`
    pub fn index_at(&self, seconds: f64) -> u64 {
        if seconds <= 0.0 {
            return 0;
        }
        let exact = seconds * self.num as f64 / self.den as f64;
        // Absorb float error so that timestamp_of(n) maps back to n
        (exact + 1e-9).floor() as u64
    }

    /// Whether two rates differ by more than `tolerance` (relative)
    pub fn differs_from(&self, other: &FrameRate, tolerance: f64) -> bool {
        (self.as_f64() - other.as_f64()).abs() > self.as_f64() * tolerance
    }

    /// Parse ffprobe's "30000/1001" notation
    pub fn parse(text: &str) -> Option<Self> {
        let (num, den) = text.split_once('/')?;
        let num: u32 = num.trim().parse().ok()?;
        let den: u32 = den.trim().parse().ok()?;
        (num > 0 && den > 0).then_some(Self { num, den })
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Native orientation of the recorded video (display rotation, clockwise)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    /// Map a rotation in degrees (as found in container metadata) to an orientation
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Right,
            180 => Self::Down,
            270 => Self::Left,
            _ => Self::Up,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Self::Up => 0,
            Self::Right => 90,
            Self::Down => 180,
            Self::Left => 270,
        }
    }

    /// Whether the stored width and height swap on display
    pub fn is_transposed(&self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }
}

/// Immutable handle to a source video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Location of the media file
    pub uri: PathBuf,

    /// Duration in seconds
    pub duration: f64,

    pub frame_rate: FrameRate,

    /// Source timestamps are irregular; decoders resample onto `frame_rate`
    #[serde(default)]
    pub variable_frame_rate: bool,

    /// Total number of decodable video frames
    pub frame_count: u64,

    /// Decoded frame size (after orientation has been applied by the decoder)
    pub width: u32,
    pub height: u32,

    pub orientation: Orientation,

    /// Whether the file carries an audio track to pass through on export
    pub has_audio: bool,

    pub codec: String,
}

impl MediaAsset {
    pub fn frame_interval(&self) -> f64 {
        self.frame_rate.frame_interval()
    }

    /// Timestamp of the last frame
    pub fn last_timestamp(&self) -> f64 {
        self.frame_rate.timestamp_of(self.frame_count.saturating_sub(1))
    }

    pub fn extension(&self) -> Option<&str> {
        self.uri.extension()?.to_str()
    }

    pub fn file_name(&self) -> String {
        self.uri
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.uri.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_index_round_trips_timestamps() {
        let rate = FrameRate::new(30000, 1001);
        for index in [0u64, 1, 29, 300, 1799] {
            assert_eq!(rate.index_at(rate.timestamp_of(index)), index);
        }
        assert_eq!(rate.index_at(-3.0), 0);
    }

    #[test]
    fn test_frame_rate_parse() {
        assert_eq!(FrameRate::parse("30000/1001"), Some(FrameRate::new(30000, 1001)));
        assert_eq!(FrameRate::parse("0/0"), None);
        assert_eq!(FrameRate::parse("25"), None);
    }

    #[test]
    fn test_orientation_from_degrees() {
        assert_eq!(Orientation::from_degrees(-90), Orientation::Left);
        assert_eq!(Orientation::from_degrees(90), Orientation::Right);
        assert!(Orientation::Right.is_transposed());
        assert!(!Orientation::Down.is_transposed());
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let frame = Frame::new_filled(400, 200, [1, 2, 3]);
        let small = frame.fit_within(100);
        assert_eq!((small.width(), small.height()), (100, 50));
        assert_eq!(small.get_pixel(10, 10), [1, 2, 3]);
    }
}
