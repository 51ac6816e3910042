//! Fixtures shared by the unit tests: deterministic frames and small raw clips.

use std::path::Path;

use crate::video::backend::FrameEncoder;
use crate::video::raw::RawVideoWriter;
use crate::video::types::{Frame, FrameRate};

/// A frame whose pixels depend on position and frame index, so every frame differs
pub(crate) fn gradient_frame(width: u32, height: u32, index: u64) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 7 + index as u32 * 3) % 256) as u8);
            data.push(((y * 11 + index as u32) % 256) as u8);
            data.push(((x + y + index as u32 * 5) % 256) as u8);
        }
    }
    Frame::from_rgb_bytes(width, height, data, index, 0.0).unwrap()
}

/// Write `frames` gradient frames into a raw clip
pub(crate) fn write_clip(path: &Path, width: u32, height: u32, rate: FrameRate, frames: u64) {
    let mut writer = Box::new(RawVideoWriter::create(path, width, height, rate).unwrap());
    for i in 0..frames {
        writer.write_frame(&gradient_frame(width, height, i)).unwrap();
    }
    writer.finish().unwrap();
}

/// Chop a finished raw clip in the middle of record `frame`
pub(crate) fn truncate_clip_at(path: &Path, width: u32, height: u32, frame: u64) {
    let record = 8 + (width * height * 3) as u64;
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(32 + frame * record + record / 2).unwrap();
}
