use crate::filters::pixels::{clamp_u8, map_pixels_xy};
use crate::filters::traits::{Filter, FilterMetadata};
use crate::video::types::Frame;

/// Darkens the frame toward its corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VignetteFilter {
    intensity: f32,
    /// Normalized distance from the center where darkening starts (1.0 = corner)
    radius: f32,
}

impl VignetteFilter {
    pub fn new(intensity: f32, radius: f32) -> Self {
        Self {
            intensity: intensity.clamp(0.0, 1.0),
            radius: radius.clamp(0.0, 1.0),
        }
    }

    /// Brightness multiplier at a normalized distance from the center
    fn falloff(&self, distance: f32) -> f32 {
        if distance <= self.radius {
            return 1.0;
        }
        let t = ((distance - self.radius) / (1.0 - self.radius).max(f32::EPSILON)).min(1.0);
        let smooth = t * t * (3.0 - 2.0 * t);
        1.0 - self.intensity * smooth
    }
}

impl Filter for VignetteFilter {
    fn name(&self) -> &str {
        "vignette"
    }

    fn description(&self) -> &str {
        "Darkened corners"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        let cx = (frame.width() as f32 - 1.0) / 2.0;
        let cy = (frame.height() as f32 - 1.0) / 2.0;
        let max_distance = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);

        map_pixels_xy(frame, |x, y, px| {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let gain = self.falloff((dx * dx + dy * dy).sqrt() / max_distance);
            px.map(|v| clamp_u8(v as f32 * gain))
        })
    }

    fn is_identity(&self) -> bool {
        self.intensity == 0.0
    }

    fn metadata(&self) -> FilterMetadata {
        FilterMetadata {
            performance_impact: 0.15,
            parameters: vec![("radius".to_string(), "Where darkening starts (0.0-1.0)".to_string())],
        }
    }
}
