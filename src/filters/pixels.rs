use image::RgbImage;
use rayon::prelude::*;

use crate::video::types::Frame;

/// Apply `f` to every pixel, rows in parallel
pub(crate) fn map_pixels<F>(frame: &Frame, f: F) -> Frame
where
    F: Fn([u8; 3]) -> [u8; 3] + Sync,
{
    map_pixels_xy(frame, |_, _, px| f(px))
}

/// Apply `f(x, y, pixel)` to every pixel, rows in parallel
pub(crate) fn map_pixels_xy<F>(frame: &Frame, f: F) -> Frame
where
    F: Fn(u32, u32, [u8; 3]) -> [u8; 3] + Sync,
{
    let (width, height) = (frame.width(), frame.height());
    let row_len = width as usize * 3;
    let mut out = frame.as_raw().to_vec();

    if row_len > 0 {
        out.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let mapped = f(x as u32, y as u32, [px[0], px[1], px[2]]);
                px.copy_from_slice(&mapped);
            }
        });
    }

    frame.with_image(image_from(width, height, out))
}

pub(crate) fn image_from(width: u32, height: u32, data: Vec<u8>) -> RgbImage {
    RgbImage::from_raw(width, height, data).unwrap_or_else(|| RgbImage::new(width, height))
}

#[inline]
pub(crate) fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
