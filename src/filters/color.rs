//! # Color Filters
//!
//! Two primitives, a 3x4 color matrix and a per-channel tone curve, and the photo
//! effects of the catalog built from them.

use std::sync::Arc;

use crate::filters::compose::Composed;
use crate::filters::pixels::{clamp_u8, map_pixels};
use crate::filters::traits::{Filter, FilterMetadata};
use crate::video::types::Frame;

const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// Affine color transform: each output channel is a weighted sum of r, g, b plus an offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub rows: [[f32; 4]; 3],
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix {
        rows: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
    };

    pub fn sepia() -> Self {
        Self {
            rows: [
                [0.393, 0.769, 0.189, 0.0],
                [0.349, 0.686, 0.168, 0.0],
                [0.272, 0.534, 0.131, 0.0],
            ],
        }
    }

    pub fn grayscale() -> Self {
        let row = [LUMA[0], LUMA[1], LUMA[2], 0.0];
        Self { rows: [row, row, row] }
    }

    pub fn invert() -> Self {
        Self {
            rows: [[-1.0, 0.0, 0.0, 255.0], [0.0, -1.0, 0.0, 255.0], [0.0, 0.0, -1.0, 255.0]],
        }
    }

    /// Scale saturation around luma (1.0 keeps colors, 0.0 is grayscale)
    pub fn saturation(amount: f32) -> Self {
        Self::grayscale().mix(amount)
    }

    /// Per-channel gain and offset
    pub fn channels(gain: [f32; 3], offset: [f32; 3]) -> Self {
        Self {
            rows: [
                [gain[0], 0.0, 0.0, offset[0]],
                [0.0, gain[1], 0.0, offset[1]],
                [0.0, 0.0, gain[2], offset[2]],
            ],
        }
    }

    /// Blend from the identity (`t = 0`) to this matrix (`t = 1`)
    ///
    /// Values of `t` above 1 extrapolate, which is how saturation boosts are expressed.
    pub fn mix(&self, t: f32) -> Self {
        let mut rows = Self::IDENTITY.rows;
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = Self::IDENTITY.rows[r][c] * (1.0 - t) + self.rows[r][c] * t;
            }
        }
        Self { rows }
    }

    /// Matrix equivalent to applying `self`, then `next` (before clamping)
    pub fn then(&self, next: &ColorMatrix) -> Self {
        let mut rows = [[0.0f32; 4]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for c in 0..3 {
                row[c] = (0..3).map(|k| next.rows[r][k] * self.rows[k][c]).sum();
            }
            row[3] = (0..3).map(|k| next.rows[r][k] * self.rows[k][3]).sum::<f32>() + next.rows[r][3];
        }
        Self { rows }
    }

    #[inline]
    pub fn transform(&self, px: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = [px[0] as f32, px[1] as f32, px[2] as f32];
        let channel = |row: &[f32; 4]| clamp_u8(row[0] * r + row[1] * g + row[2] * b + row[3]);
        [channel(&self.rows[0]), channel(&self.rows[1]), channel(&self.rows[2])]
    }
}

/// Filter applying a [`ColorMatrix`] to every pixel
#[derive(Debug, Clone)]
pub struct ColorMatrixFilter {
    name: String,
    matrix: ColorMatrix,
}

impl ColorMatrixFilter {
    pub fn new(name: impl Into<String>, matrix: ColorMatrix) -> Self {
        Self { name: name.into(), matrix }
    }

    pub fn matrix(&self) -> &ColorMatrix {
        &self.matrix
    }
}

impl Filter for ColorMatrixFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Color matrix"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        let matrix = self.matrix;
        map_pixels(frame, move |px| matrix.transform(px))
    }

    fn is_identity(&self) -> bool {
        self.matrix == ColorMatrix::IDENTITY
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.1,
            parameters: vec![("intensity".to_string(), "Blend toward the effect (0.0-1.0)".to_string())],
        }
    }
}

/// Lookup table applied to each channel independently
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    lut: [[u8; 256]; 3],
}

impl ToneCurve {
    pub fn from_fn(f: impl Fn(usize, f32) -> f32) -> Self {
        let mut lut = [[0u8; 256]; 3];
        for (channel, table) in lut.iter_mut().enumerate() {
            for (v, out) in table.iter_mut().enumerate() {
                *out = clamp_u8(f(channel, v as f32));
            }
        }
        Self { lut }
    }

    /// Stretch (k > 1) or flatten (k < 1) around mid-gray
    pub fn contrast(k: f32) -> Self {
        Self::from_fn(|_, v| (v - 128.0) * k + 128.0)
    }

    /// Map black to `black` and white to `white`
    pub fn levels(black: f32, white: f32) -> Self {
        Self::from_fn(|_, v| black + v * (white - black) / 255.0)
    }

    /// Smooth S-curve; `strength` 0 is linear
    pub fn s_curve(strength: f32) -> Self {
        Self::from_fn(|_, v| {
            let x = v / 255.0;
            let smooth = x * x * (3.0 - 2.0 * x);
            (x + (smooth - x) * strength) * 255.0
        })
    }

    #[inline]
    pub fn transform(&self, px: [u8; 3]) -> [u8; 3] {
        [
            self.lut[0][px[0] as usize],
            self.lut[1][px[1] as usize],
            self.lut[2][px[2] as usize],
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ToneCurveFilter {
    name: String,
    curve: ToneCurve,
}

impl ToneCurveFilter {
    pub fn new(name: impl Into<String>, curve: ToneCurve) -> Self {
        Self { name: name.into(), curve }
    }
}

impl Filter for ToneCurveFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Tone curve"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        map_pixels(frame, |px| self.curve.transform(px))
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.05,
            parameters: Vec::new(),
        }
    }
}

fn matrix_then_curve(name: &str, description: &str, matrix: ColorMatrix, curve: ToneCurve) -> Composed {
    Composed::named(
        name,
        description,
        Arc::new(ColorMatrixFilter::new(format!("{}-matrix", name), matrix)),
        Arc::new(ToneCurveFilter::new(format!("{}-curve", name), curve)),
    )
}

pub fn sepia(intensity: f32) -> ColorMatrixFilter {
    ColorMatrixFilter::new("sepia", ColorMatrix::sepia().mix(intensity))
}

pub fn mono(intensity: f32) -> ColorMatrixFilter {
    ColorMatrixFilter::new("mono", ColorMatrix::grayscale().mix(intensity))
}

pub fn invert() -> ColorMatrixFilter {
    ColorMatrixFilter::new("invert", ColorMatrix::invert())
}

pub fn noir(intensity: f32) -> Composed {
    matrix_then_curve(
        "noir",
        "High-contrast black and white",
        ColorMatrix::grayscale().mix(intensity),
        ToneCurve::contrast(1.0 + 0.6 * intensity),
    )
}

pub fn tonal(intensity: f32) -> Composed {
    matrix_then_curve(
        "tonal",
        "Soft black and white with lifted shadows",
        ColorMatrix::grayscale().mix(intensity),
        ToneCurve::levels(18.0 * intensity, 255.0 - 8.0 * intensity),
    )
}

pub fn chrome(intensity: f32) -> Composed {
    matrix_then_curve(
        "chrome",
        "Punchy colors with extra contrast",
        ColorMatrix::saturation(1.0 + 0.35 * intensity),
        ToneCurve::s_curve(0.5 * intensity),
    )
}

pub fn fade(intensity: f32) -> Composed {
    matrix_then_curve(
        "fade",
        "Washed-out colors with milky blacks",
        ColorMatrix::saturation(1.0 - 0.35 * intensity),
        ToneCurve::levels(40.0 * intensity, 255.0 - 15.0 * intensity),
    )
}

pub fn instant(intensity: f32) -> Composed {
    let warm = ColorMatrix::channels([1.05, 1.0, 0.88], [8.0, 4.0, 0.0]);
    matrix_then_curve(
        "instant",
        "Warm instant-camera print",
        ColorMatrix::saturation(0.85).then(&warm).mix(intensity),
        ToneCurve::levels(24.0 * intensity, 255.0 - 10.0 * intensity),
    )
}

pub fn process(intensity: f32) -> Composed {
    let cool = ColorMatrix::channels([0.92, 1.0, 1.08], [0.0, 6.0, 14.0]);
    matrix_then_curve(
        "process",
        "Cool cross-processed look",
        cool.mix(intensity),
        ToneCurve::contrast(1.0 + 0.2 * intensity),
    )
}

pub fn transfer(intensity: f32) -> Composed {
    let warm = ColorMatrix::channels([1.0, 0.97, 0.85], [12.0, 4.0, -6.0]);
    matrix_then_curve(
        "transfer",
        "Vintage transfer with warm highlights",
        ColorMatrix::saturation(0.8).then(&warm).mix(intensity),
        ToneCurve::s_curve(0.3 * intensity),
    )
}
