//! # Raw Container
//!
//! Uncompressed RGB frames behind a fixed 32-byte header. Lossless and free of
//! external tools, so decode and encode are exact and fast to seek.
//!
//! ```text
//! header:  magic "SNAPRAW1" | width u32 | height u32 | rate num u32 | rate den u32 | frame count u64
//! record:  frame index u64 | width * height * 3 bytes of RGB
//! ```
//!
//! All integers are little-endian. The frame count is patched in when the writer finishes,
//! so a file from an interrupted writer reports zero frames.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{DecodeError, EditorError, EncodeError, Result};
use crate::video::backend::{DecoderBackend, EncodeSettings, EncoderBackend, FrameDecoder, FrameEncoder};
use crate::video::types::{Frame, FrameRate, MediaAsset, Orientation};

/// File extension handled by [`RawBackend`]
pub const RAW_EXTENSION: &str = "sraw";

const MAGIC: &[u8; 8] = b"SNAPRAW1";
const HEADER_LEN: u64 = 32;
const FRAME_COUNT_OFFSET: u64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawHeader {
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    frame_count: u64,
}

impl RawHeader {
    fn frame_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * 3
    }

    fn record_len(&self) -> u64 {
        8 + self.frame_bytes()
    }

    fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut out = [0u8; HEADER_LEN as usize];
        out[0..8].copy_from_slice(MAGIC);
        out[8..12].copy_from_slice(&self.width.to_le_bytes());
        out[12..16].copy_from_slice(&self.height.to_le_bytes());
        out[16..20].copy_from_slice(&self.frame_rate.num.to_le_bytes());
        out[20..24].copy_from_slice(&self.frame_rate.den.to_le_bytes());
        out[24..32].copy_from_slice(&self.frame_count.to_le_bytes());
        out
    }

    fn read_from<R: Read>(reader: &mut R, path: &Path) -> Result<Self> {
        let mut bytes = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut bytes).map_err(|e| DecodeError::ProbeFailed {
            path: path.display().to_string(),
            reason: format!("header unreadable: {}", e),
        })?;

        if &bytes[0..8] != MAGIC {
            return Err(DecodeError::UnsupportedFormat {
                format: format!("{} (bad magic)", path.display()),
            }
            .into());
        }

        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[24..32]);

        let header = Self {
            width: u32_at(8),
            height: u32_at(12),
            frame_rate: FrameRate::new(u32_at(16), u32_at(20)),
            frame_count: u64::from_le_bytes(count),
        };

        if header.width == 0 || header.height == 0 || header.frame_rate.num == 0 || header.frame_rate.den == 0 {
            return Err(DecodeError::ProbeFailed {
                path: path.display().to_string(),
                reason: "zero dimension or frame rate in header".to_string(),
            }
            .into());
        }

        Ok(header)
    }
}

/// Pure-Rust backend for the raw container
#[derive(Debug, Default)]
pub struct RawBackend;

impl RawBackend {
    pub fn new() -> Self {
        Self
    }

    fn open_file(path: &Path) -> Result<File> {
        File::open(path).map_err(|e| {
            DecodeError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl DecoderBackend for RawBackend {
    fn name(&self) -> &str {
        "raw"
    }

    fn probe(&self, path: &Path) -> Result<MediaAsset> {
        let mut reader = BufReader::new(Self::open_file(path)?);
        let header = RawHeader::read_from(&mut reader, path)?;
        let duration = header.frame_count as f64 * header.frame_rate.frame_interval();

        debug!(
            "Probed raw file {:?}: {}x{} @ {} fps, {} frames",
            path, header.width, header.height, header.frame_rate, header.frame_count
        );

        Ok(MediaAsset {
            uri: path.to_path_buf(),
            duration,
            frame_rate: header.frame_rate,
            variable_frame_rate: false,
            frame_count: header.frame_count,
            width: header.width,
            height: header.height,
            orientation: Orientation::Up,
            has_audio: false,
            codec: "rawvideo".to_string(),
        })
    }

    fn open(&self, asset: &MediaAsset, start_index: u64) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(RawDecoder::open(&asset.uri, start_index)?))
    }
}

impl EncoderBackend for RawBackend {
    fn name(&self) -> &str {
        "raw"
    }

    fn create(&self, settings: &EncodeSettings) -> Result<Box<dyn FrameEncoder>> {
        if settings.audio_source.is_some() {
            debug!("Raw container carries no audio, dropping audio track");
        }
        Ok(Box::new(RawVideoWriter::create(
            &settings.output,
            settings.width,
            settings.height,
            settings.frame_rate,
        )?))
    }
}

/// Reads records sequentially from a raw file
pub struct RawDecoder {
    reader: BufReader<File>,
    header: RawHeader,
    next_index: u64,
    scratch: Vec<u8>,
}

impl RawDecoder {
    pub fn open(path: &Path, start_index: u64) -> Result<Self> {
        let mut reader = BufReader::new(RawBackend::open_file(path)?);
        let header = RawHeader::read_from(&mut reader, path)?;
        let start_index = start_index.min(header.frame_count);

        reader
            .seek(SeekFrom::Start(HEADER_LEN + start_index * header.record_len()))
            .map_err(|e| DecodeError::Corrupt {
                frame: start_index,
                reason: format!("seek failed: {}", e),
            })?;

        Ok(Self {
            reader,
            header,
            next_index: start_index,
            scratch: vec![0u8; header.frame_bytes() as usize],
        })
    }
}

impl FrameDecoder for RawDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next_index >= self.header.frame_count {
            return Ok(None);
        }

        let index = self.next_index;
        let corrupt = |e: std::io::Error| DecodeError::Corrupt {
            frame: index,
            reason: if e.kind() == ErrorKind::UnexpectedEof {
                "stream ends before the declared frame count".to_string()
            } else {
                e.to_string()
            },
        };

        let mut index_bytes = [0u8; 8];
        self.reader.read_exact(&mut index_bytes).map_err(corrupt)?;
        let stored = u64::from_le_bytes(index_bytes);
        if stored != index {
            return Err(DecodeError::Corrupt {
                frame: index,
                reason: format!("record carries index {}", stored),
            }
            .into());
        }

        self.reader.read_exact(&mut self.scratch).map_err(corrupt)?;
        self.next_index += 1;

        let frame = Frame::from_rgb_bytes(
            self.header.width,
            self.header.height,
            self.scratch.clone(),
            index,
            self.header.frame_rate.timestamp_of(index),
        )
        .ok_or_else(|| DecodeError::Corrupt {
            frame: index,
            reason: "frame buffer size mismatch".to_string(),
        })?;

        Ok(Some(frame))
    }
}

/// Writes frames into a raw file
pub struct RawVideoWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    header: RawHeader,
}

impl RawVideoWriter {
    pub fn create(path: &Path, width: u32, height: u32, frame_rate: FrameRate) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EncodeError::InvalidParameters {
                details: format!("frame size {}x{}", width, height),
            }
            .into());
        }

        let start_failed = |reason: String| EncodeError::StartFailed {
            reason: format!("{}: {}", path.display(), reason),
        };
        let file = File::create(path).map_err(|e| EditorError::from_write(path, e, start_failed))?;

        let header = RawHeader { width, height, frame_rate, frame_count: 0 };
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&header.encode())
            .map_err(|e| EditorError::from_write(path, e, start_failed))?;

        Ok(Self { writer, path: path.to_path_buf(), header })
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u64 {
        self.header.frame_count
    }

    fn write_record(&mut self, index: u64, frame: &Frame) -> std::io::Result<()> {
        self.writer.write_all(&index.to_le_bytes())?;
        self.writer.write_all(frame.as_raw())
    }

    fn finalize(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        file.write_all(&self.header.frame_count.to_le_bytes())?;
        file.sync_all()
    }
}

impl FrameEncoder for RawVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let index = self.header.frame_count;

        if frame.width() != self.header.width || frame.height() != self.header.height {
            return Err(EncodeError::WriteFailed {
                frame: index,
                reason: format!(
                    "frame size mismatch: got {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    self.header.width,
                    self.header.height
                ),
            }
            .into());
        }

        // Records are numbered densely so the file always decodes from index 0
        self.write_record(index, frame).map_err(|e| {
            EditorError::from_write(&self.path, e, |reason| EncodeError::WriteFailed { frame: index, reason })
        })?;
        self.header.frame_count += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        let path = self.path.clone();
        self.finalize().map_err(|e| {
            EditorError::from_write(&path, e, |reason| EncodeError::FinalizeFailed {
                reason: format!("{}: {}", path.display(), reason),
            })
        })?;
        info!("Wrote {} raw frames to {:?}", self.header.frame_count, self.path);
        Ok(())
    }
}
