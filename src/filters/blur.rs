use rayon::prelude::*;

use crate::filters::pixels::image_from;
use crate::filters::traits::{Filter, FilterMetadata};
use crate::video::types::Frame;

/// Box passes per axis; three passes approximate a gaussian
const PASSES: usize = 3;

/// Largest radius a blur honours; larger radii are treated as this one
pub const MAX_RADIUS: u32 = 1024;

/// Approximate gaussian blur built from repeated separable box blurs
///
/// Edges are clamped, so a uniformly colored frame comes back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurFilter {
    radius: u32,
}

impl BlurFilter {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }
}

impl Filter for BlurFilter {
    fn name(&self) -> &str {
        "blur"
    }

    fn description(&self) -> &str {
        "Gaussian-style blur"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        if self.radius == 0 || frame.width() == 0 || frame.height() == 0 {
            return frame.clone();
        }
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        let radius = self.radius.min(MAX_RADIUS) as usize;

        let mut data = frame.as_raw().to_vec();
        for _ in 0..PASSES {
            data = box_rows(&data, width, height, radius);
            // Vertical pass runs as a horizontal pass over the transposed image
            let transposed = transpose(&data, width, height);
            data = transpose(&box_rows(&transposed, height, width, radius), height, width);
        }

        frame.with_image(image_from(frame.width(), frame.height(), data))
    }

    fn is_identity(&self) -> bool {
        self.radius == 0
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.6,
            parameters: vec![("radius".to_string(), "Blur radius in pixels".to_string())],
        }
    }
}

/// One box pass along every row, with a running window sum per channel
fn box_rows(src: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    let row_len = width * 3;
    let window = (2 * radius + 1) as u64;
    let mut out = vec![0u8; row_len * height];
    let last = width - 1;

    out.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(dst, row)| {
            for c in 0..3 {
                let at = |x: isize| row[x.clamp(0, last as isize) as usize * 3 + c] as u64;

                let mut sum: u64 = (-(radius as isize)..=radius as isize).map(at).sum();
                for x in 0..width {
                    dst[x * 3 + c] = ((sum + window / 2) / window) as u8;
                    let xi = x as isize;
                    sum = sum + at(xi + radius as isize + 1) - at(xi - radius as isize);
                }
            }
        });

    out
}

fn transpose(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(height * 3).enumerate().for_each(|(x, column)| {
        for y in 0..height {
            let from = (y * width + x) * 3;
            column[y * 3..y * 3 + 3].copy_from_slice(&src[from..from + 3]);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::testing::gradient_frame;

    #[test]
    fn test_uniform_frame_is_unchanged() {
        let frame = Frame::new_filled(20, 10, [37, 140, 250]);
        assert_eq!(BlurFilter::new(4).apply(&frame), frame);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let frame = gradient_frame(9, 7, 2);
        let blur = BlurFilter::new(0);
        assert!(blur.is_identity());
        assert_eq!(blur.apply(&frame), frame);
    }

    #[test]
    fn test_blur_smooths_a_hard_edge() {
        let mut image = Frame::new_filled(20, 4, [0, 0, 0]).into_image();
        for y in 0..4 {
            for x in 10..20 {
                image.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }
        let frame = Frame::new(image, 0, 0.0);
        let out = BlurFilter::new(2).apply(&frame);

        let left = out.get_pixel(9, 1)[0];
        let right = out.get_pixel(10, 1)[0];
        assert!(left > 0 && left < 128, "left of edge was {}", left);
        assert!(right > 128 && right < 255, "right of edge was {}", right);
        assert_eq!(out.get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(out.get_pixel(19, 3), [255, 255, 255]);
    }

    #[test]
    fn test_radius_larger_than_frame() {
        let frame = gradient_frame(3, 2, 0);
        let out = BlurFilter::new(100).apply(&frame);
        assert_eq!((out.width(), out.height()), (3, 2));
    }

    #[test]
    fn test_huge_radius_is_capped() {
        let frame = gradient_frame(2, 1, 0);
        let capped = BlurFilter::new(MAX_RADIUS).apply(&frame);
        assert_eq!(BlurFilter::new(20_000_000).apply(&frame), capped);
        assert_eq!(BlurFilter::new(u32::MAX).apply(&Frame::new_filled(1, 1, [9, 9, 9])).get_pixel(0, 0), [9, 9, 9]);
    }

    #[test]
    fn test_transpose_round_trip() {
        let frame = gradient_frame(5, 3, 1);
        let t = transpose(frame.as_raw(), 5, 3);
        assert_eq!(transpose(&t, 3, 5), frame.as_raw());
    }
}
