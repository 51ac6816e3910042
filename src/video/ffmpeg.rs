use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::VideoConfig;
use crate::error::{DecodeError, EditorError, EncodeError, Result, StorageError};
use crate::video::backend::{DecoderBackend, EncodeSettings, EncoderBackend, FrameDecoder, FrameEncoder};
use crate::video::types::{Frame, FrameRate, MediaAsset, Orientation};

/// Decodes and encodes through the system `ffmpeg`/`ffprobe` programs
///
/// One child process per decode handle; frames cross the pipe as packed `rgb24`.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegBackend {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }

    /// Return `true` when `ffmpeg` can be invoked
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run_ffprobe(&self, path: &Path) -> Result<ProbeOutput> {
        let probe_failed = |reason: String| DecodeError::ProbeFailed {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(DecodeError::OpenFailed {
                path: path.display().to_string(),
                reason: "file does not exist".to_string(),
            }
            .into());
        }

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| probe_failed(format!("could not run {}: {}", self.ffprobe, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_failed(stderr.trim().to_string()).into());
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| probe_failed(format!("invalid ffprobe output: {}", e)).into())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeOutput {
    fn into_asset(self, path: &Path) -> Result<MediaAsset> {
        let has_audio = self
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let format_duration = self
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok());

        let video = self
            .streams
            .into_iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: format!("{}: no video stream", path.display()),
            })?;

        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(DecodeError::ProbeFailed {
                    path: path.display().to_string(),
                    reason: "video stream has no frame size".to_string(),
                }
                .into())
            }
        };

        let average_rate = video.avg_frame_rate.as_deref().and_then(FrameRate::parse);
        let base_rate = video.r_frame_rate.as_deref().and_then(FrameRate::parse);
        let frame_rate = average_rate.or(base_rate).unwrap_or_else(|| {
            warn!("No usable frame rate for {:?}, assuming 30 fps", path);
            FrameRate::default()
        });

        // Phone recordings often have irregular timestamps: the base rate then
        // disagrees with the average one
        let variable_frame_rate = match (average_rate, base_rate) {
            (Some(average), Some(base)) => average.differs_from(&base, VFR_TOLERANCE),
            _ => false,
        };
        if variable_frame_rate {
            warn!(
                "{:?} has a variable frame rate ({} average, {} base); frames are resampled to {} fps",
                path, frame_rate, base_rate.unwrap_or_default(), frame_rate
            );
        }

        let duration = video
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .or(format_duration)
            .unwrap_or(0.0);

        // Resampled streams have one frame per grid slot, not one per stored frame
        let stored_frames = if variable_frame_rate {
            None
        } else {
            video.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok())
        };
        let frame_count = stored_frames.unwrap_or_else(|| (duration * frame_rate.as_f64()).round() as u64);

        let rotation = video
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .map(|degrees| -degrees)
            .or_else(|| video.tags.get("rotate").and_then(|r| r.parse::<i64>().ok()))
            .unwrap_or(0);
        let orientation = Orientation::from_degrees(rotation);

        // ffmpeg rotates on decode, so decoded frames come out in display orientation
        let (width, height) = if orientation.is_transposed() { (height, width) } else { (width, height) };

        Ok(MediaAsset {
            uri: path.to_path_buf(),
            duration,
            frame_rate,
            variable_frame_rate,
            frame_count,
            width,
            height,
            orientation,
            has_audio,
            codec: video.codec_name.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

impl DecoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn probe(&self, path: &Path) -> Result<MediaAsset> {
        let asset = self.run_ffprobe(path)?.into_asset(path)?;
        info!(
            "Video metadata: {}x{} @ {} fps, {:.2}s, {} frames, audio: {}",
            asset.width, asset.height, asset.frame_rate, asset.duration, asset.frame_count, asset.has_audio
        );
        Ok(asset)
    }

    fn open(&self, asset: &MediaAsset, start_index: u64) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(FfmpegDecoder::spawn(&self.ffmpeg, asset, start_index)?))
    }
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn create(&self, settings: &EncodeSettings) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(FfmpegEncoder::spawn(&self.ffmpeg, settings)?))
    }
}

fn drain_stderr(mut stderr: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = stderr.read_to_end(&mut bytes);
        bytes
    })
}

fn collect_stderr(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default()
}

/// Fill `buf` from `reader`, returning how many bytes arrived before end of stream
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streams frames out of a single ffmpeg process
pub struct FfmpegDecoder {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    next_index: u64,
    scratch: Vec<u8>,
}

impl FfmpegDecoder {
    pub fn spawn(ffmpeg: &str, asset: &MediaAsset, start_index: u64) -> Result<Self> {
        let start_index = start_index.min(asset.frame_count);
        let start_time = asset.frame_rate.timestamp_of(start_index);

        let mut cmd = Command::new(ffmpeg);
        cmd.args(decoder_args(asset, start_index))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Starting ffmpeg decoder for {:?} at frame {} ({:.3}s)", asset.uri, start_index, start_time);

        let mut child = cmd.spawn().map_err(|e| DecodeError::OpenFailed {
            path: asset.uri.display().to_string(),
            reason: format!("failed to spawn {}: {}", ffmpeg, e),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Self {
            child: Some(child),
            stdout,
            stderr,
            width: asset.width,
            height: asset.height,
            frame_rate: asset.frame_rate,
            next_index: start_index,
            scratch: vec![0u8; asset.width as usize * asset.height as usize * 3],
        })
    }

    fn finish_stream(&mut self) -> Result<()> {
        self.stdout.take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| DecodeError::DecoderFailed {
            reason: format!("failed to wait for ffmpeg: {}", e),
        })?;
        let stderr = collect_stderr(self.stderr.take());

        if !status.success() {
            return Err(DecodeError::Corrupt {
                frame: self.next_index,
                reason: format!("ffmpeg exited with {}: {}", status, stderr),
            }
            .into());
        }
        Ok(())
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let index = self.next_index;
        let filled = read_full(stdout, &mut self.scratch).map_err(|e| DecodeError::DecoderFailed {
            reason: format!("read from ffmpeg failed at frame {}: {}", index, e),
        })?;

        if filled == 0 {
            self.finish_stream()?;
            return Ok(None);
        }
        if filled < self.scratch.len() {
            let _ = self.finish_stream();
            return Err(DecodeError::Corrupt {
                frame: index,
                reason: format!("short frame: {} of {} bytes", filled, self.scratch.len()),
            }
            .into());
        }

        self.next_index += 1;
        let frame = Frame::from_rgb_bytes(
            self.width,
            self.height,
            self.scratch.clone(),
            index,
            self.frame_rate.timestamp_of(index),
        )
        .ok_or_else(|| DecodeError::Corrupt {
            frame: index,
            reason: "frame buffer size mismatch".to_string(),
        })?;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Pipes frames into an ffmpeg encoder, copying the source audio alongside
pub struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    output: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn spawn(ffmpeg: &str, settings: &EncodeSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(EncodeError::InvalidParameters {
                details: format!("frame size {}x{}", settings.width, settings.height),
            }
            .into());
        }

        let mut cmd = Command::new(ffmpeg);
        cmd.args(encoder_args(settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        info!(
            "Starting ffmpeg encoder: {}x{} @ {} fps, codec {}, output {:?}",
            settings.width, settings.height, settings.frame_rate, settings.codec, settings.output
        );

        let mut child = cmd.spawn().map_err(|e| EncodeError::StartFailed {
            reason: format!("failed to spawn {} (is it installed?): {}", ffmpeg, e),
        })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Self {
            child: Some(child),
            stdin,
            stderr,
            output: settings.output.clone(),
            width: settings.width,
            height: settings.height,
            frames_written: 0,
        })
    }

    /// Reap an ffmpeg that stopped taking frames, explaining the failure from its log
    fn exited_early(&mut self, error: std::io::Error) -> EditorError {
        let frame = self.frames_written;
        drop(self.stdin.take());
        let status = self.child.take().and_then(|mut child| child.wait().ok());
        let log = collect_stderr(self.stderr.take());

        if let Some(storage) = StorageError::from_encoder_log(&self.output, &log) {
            return storage.into();
        }
        EditorError::from_write(&self.output, error, |reason| EncodeError::WriteFailed {
            frame,
            reason: match status {
                Some(status) => format!("{} (ffmpeg exited with {}: {})", reason, status, log),
                None => reason,
            },
        })
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(EncodeError::WriteFailed {
                frame: self.frames_written,
                reason: format!(
                    "frame size mismatch: got {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| EncodeError::WriteFailed {
            frame: self.frames_written,
            reason: "encoder already finalized".to_string(),
        })?;

        if let Err(e) = stdin.write_all(frame.as_raw()) {
            return Err(self.exited_early(e));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        drop(self.stdin.take());
        let mut child = self.child.take().ok_or_else(|| EncodeError::FinalizeFailed {
            reason: "encoder was never started".to_string(),
        })?;

        let status = child.wait().map_err(|e| EncodeError::FinalizeFailed {
            reason: format!("failed to wait for ffmpeg: {}", e),
        })?;
        let stderr = collect_stderr(self.stderr.take());

        if !status.success() {
            if let Some(storage) = StorageError::from_encoder_log(&self.output, &stderr) {
                return Err(storage.into());
            }
            return Err(EncodeError::FinalizeFailed {
                reason: format!("ffmpeg exited with {}: {}", status, stderr),
            }
            .into());
        }

        debug!("ffmpeg encoder finished after {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Aborting ffmpeg encoder after {} frames", self.frames_written);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Relative gap between base and average rate above which a stream counts as variable
const VFR_TOLERANCE: f64 = 0.01;

fn os_args(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

/// Command line streaming `asset` as packed rgb24 from `start_index` onwards
fn decoder_args(asset: &MediaAsset, start_index: u64) -> Vec<OsString> {
    let start_time = asset.frame_rate.timestamp_of(start_index);

    let mut args = os_args(&["-v", "error", "-nostdin", "-ss", &format!("{:.6}", start_time), "-i"]);
    args.push(asset.uri.clone().into_os_string());
    args.extend(os_args(&["-an", "-sn"]));
    if asset.variable_frame_rate {
        // Put frames on the constant grid that frame indices and the encoder assume
        args.extend(os_args(&["-fps_mode", "cfr", "-r", &asset.frame_rate.to_string()]));
    } else {
        args.extend(os_args(&["-fps_mode", "passthrough"]));
    }
    args.extend(os_args(&["-f", "rawvideo", "-pix_fmt", "rgb24"]));
    args.extend(os_args(&["-s", &format!("{}x{}", asset.width, asset.height), "pipe:1"]));
    args
}

/// Command line encoding rgb24 from stdin, stream-copying the source audio when asked
fn encoder_args(settings: &EncodeSettings) -> Vec<OsString> {
    let mut args = os_args(&["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"]);
    args.extend(os_args(&["-s", &format!("{}x{}", settings.width, settings.height)]));
    args.extend(os_args(&["-r", &settings.frame_rate.to_string(), "-i", "pipe:0"]));

    match settings.audio_source.as_ref() {
        Some(source) => {
            args.push(OsString::from("-i"));
            args.push(source.clone().into_os_string());
            args.extend(os_args(&["-map", "0:v:0", "-map", "1:a?", "-c:a", "copy"]));
        }
        None => args.push(OsString::from("-an")),
    }

    // yuv420p needs even dimensions
    args.extend(os_args(&["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"]));
    args.extend(os_args(&["-c:v", &settings.codec, "-pix_fmt", "yuv420p"]));
    args.extend(os_args(&["-crf", &quality_to_crf(settings.quality).to_string()]));
    args.extend(os_args(&["-fps_mode", "passthrough", "-movflags", "+faststart"]));
    args.push(settings.output.clone().into_os_string());
    args
}

fn quality_to_crf(quality: u8) -> u8 {
    (51 - ((quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30000/1001",
                "nb_frames": "300",
                "duration": "10.010000",
                "side_data_list": [{ "rotation": -90 }]
            },
            { "codec_type": "audio", "codec_name": "aac" }
        ],
        "format": { "duration": "10.020000" }
    }"#;

    #[test]
    fn test_probe_output_to_asset() {
        let probe: ProbeOutput = serde_json::from_str(PROBE_JSON).unwrap();
        let asset = probe.into_asset(Path::new("clip.mov")).unwrap();

        assert_eq!(asset.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(asset.frame_count, 300);
        assert!(asset.has_audio);
        assert_eq!(asset.orientation, Orientation::Right);
        // Portrait recording: decoded frames are upright
        assert_eq!((asset.width, asset.height), (1080, 1920));
        assert!((asset.duration - 10.01).abs() < 1e-9);
    }

    #[test]
    fn test_probe_without_video_stream_is_unsupported() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{ "streams": [{ "codec_type": "audio" }], "format": { "duration": "3.0" } }"#,
        )
        .unwrap();
        assert!(probe.into_asset(Path::new("song.m4a")).is_err());
    }

    #[test]
    fn test_frame_count_falls_back_to_duration() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{ "streams": [{ "codec_type": "video", "width": 640, "height": 480,
                 "avg_frame_rate": "25/1" }], "format": { "duration": "4.0" } }"#,
        )
        .unwrap();
        let asset = probe.into_asset(Path::new("clip.webm")).unwrap();
        assert_eq!(asset.frame_count, 100);
        assert!(!asset.has_audio);
    }

    #[test]
    fn test_variable_frame_rate_is_resampled() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{ "streams": [{ "codec_type": "video", "width": 1280, "height": 720,
                 "r_frame_rate": "120/1", "avg_frame_rate": "2997/100", "nb_frames": "287",
                 "duration": "10.0" }] }"#,
        )
        .unwrap();
        let asset = probe.into_asset(Path::new("phone.mp4")).unwrap();

        assert!(asset.variable_frame_rate);
        assert_eq!(asset.frame_rate, FrameRate::new(2997, 100));
        // One frame per slot of the resampled grid
        assert_eq!(asset.frame_count, 300);

        let args = decoder_args(&asset, 0);
        assert_eq!(value_after(&args, "-fps_mode"), Some("cfr"));
        assert_eq!(value_after(&args, "-r"), Some("2997/100"));
    }

    fn asset() -> MediaAsset {
        let probe: ProbeOutput = serde_json::from_str(PROBE_JSON).unwrap();
        probe.into_asset(Path::new("clip.mov")).unwrap()
    }

    fn settings(audio_source: Option<PathBuf>) -> EncodeSettings {
        EncodeSettings {
            output: PathBuf::from(".out.partial.mp4"),
            width: 1080,
            height: 1920,
            frame_rate: FrameRate::new(30000, 1001),
            audio_source,
            codec: "libx264".to_string(),
            quality: 100,
        }
    }

    fn value_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a str> {
        let at = args.iter().position(|a| a == flag)?;
        args.get(at + 1)?.to_str()
    }

    fn has_sequence(args: &[OsString], sequence: &[&str]) -> bool {
        args.windows(sequence.len())
            .any(|w| w.iter().zip(sequence).all(|(a, b)| a == b))
    }

    #[test]
    fn test_constant_rate_decode_passes_frames_through() {
        let asset = asset();
        assert!(!asset.variable_frame_rate);

        let args = decoder_args(&asset, 30);
        assert_eq!(value_after(&args, "-fps_mode"), Some("passthrough"));
        assert_eq!(value_after(&args, "-ss"), Some("1.001000"));
        assert_eq!(value_after(&args, "-i"), Some("clip.mov"));
        assert_eq!(value_after(&args, "-s"), Some("1080x1920"));
        assert!(has_sequence(&args, &["-an", "-sn"]));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_encoder_copies_source_audio() {
        let args = encoder_args(&settings(Some(PathBuf::from("clip.mov"))));

        assert!(has_sequence(&args, &["-i", "clip.mov"]));
        assert!(has_sequence(&args, &["-map", "0:v:0", "-map", "1:a?", "-c:a", "copy"]));
        assert!(!args.iter().any(|a| a == "-an"));
        assert_eq!(value_after(&args, "-r"), Some("30000/1001"));
        assert_eq!(args.last().unwrap(), ".out.partial.mp4");
    }

    #[test]
    fn test_encoder_without_audio_drops_it() {
        let args = encoder_args(&settings(None));

        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-c:a"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
    }

    #[test]
    fn test_encoder_codec_and_crf() {
        let mut settings = settings(None);
        settings.codec = "libx265".to_string();
        settings.quality = 0;

        let args = encoder_args(&settings);
        assert_eq!(value_after(&args, "-c:v"), Some("libx265"));
        assert_eq!(value_after(&args, "-crf"), Some("51"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("rgb24"));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, stderr: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\necho '{}' >&2\nexit 1\n", stderr)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_dying_on_full_disk_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "Error writing trailer: No space left on device");

        let mut settings = settings(None);
        settings.width = 200;
        settings.height = 200;
        let mut encoder = FfmpegEncoder::spawn(&ffmpeg, &settings).unwrap();

        // Larger than a pipe buffer, so the write sees the closed pipe
        let frame = Frame::new_filled(200, 200, [10, 20, 30]);
        match encoder.write_frame(&frame) {
            Err(EditorError::Storage(StorageError::InsufficientSpace { path })) => {
                assert_eq!(path, ".out.partial.mp4")
            }
            other => panic!("expected insufficient space, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_write_failure_carries_ffmpeg_log() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "Unknown encoder libx265");

        let mut settings = settings(None);
        settings.width = 200;
        settings.height = 200;
        let mut encoder = FfmpegEncoder::spawn(&ffmpeg, &settings).unwrap();

        match encoder.write_frame(&Frame::new_filled(200, 200, [0, 0, 0])) {
            Err(EditorError::Encode(EncodeError::WriteFailed { frame, reason })) => {
                assert_eq!(frame, 0);
                assert!(reason.contains("Unknown encoder libx265"), "{}", reason);
            }
            other => panic!("expected write failure, got {:?}", other),
        }
    }

    #[test]
    fn test_quality_to_crf() {
        assert_eq!(quality_to_crf(100), 0);
        assert_eq!(quality_to_crf(0), 51);
        assert_eq!(quality_to_crf(200), 0);
    }

    #[test]
    fn test_read_full_reports_short_reads() {
        let data = vec![7u8; 10];
        let mut buf = vec![0u8; 16];
        assert_eq!(read_full(&mut data.as_slice(), &mut buf).unwrap(), 10);
    }
}
