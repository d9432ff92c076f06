//! Pure calculation functions for resize decisions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Dimensions;

/// Upper bounds a bitmap must fit inside. Each bound is optional and
/// independent of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeLimits {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_pixels: Option<u64>,
}

impl SizeLimits {
    /// True when no bound is set, so the resize stage can skip decoding.
    pub fn is_unbounded(&self) -> bool {
        self.max_width.is_none() && self.max_height.is_none() && self.max_pixels.is_none()
    }
}

/// Calculate the uniform scale factor that satisfies every limit at once.
///
/// Each bound yields its own candidate and the result is the minimum of all
/// candidates and `1.0`, so images are only ever shrunk.
///
/// # Examples
/// ```
/// # use imgprep::imaging::{Dimensions, SizeLimits, calculate_scale};
/// let limits = SizeLimits { max_pixels: Some(4096), ..SizeLimits::default() };
/// assert_eq!(calculate_scale(Dimensions::new(128, 128), &limits), 0.5);
/// ```
pub fn calculate_scale(source: Dimensions, limits: &SizeLimits) -> f64 {
    if source.is_empty() {
        return 1.0;
    }
    let width = source.width as f64;
    let height = source.height as f64;

    let mut scale: f64 = 1.0;
    if let Some(max_width) = limits.max_width {
        scale = scale.min(max_width as f64 / width);
    }
    if let Some(max_height) = limits.max_height {
        scale = scale.min(max_height as f64 / height);
    }
    if let Some(max_pixels) = limits.max_pixels {
        let pixels = source.pixels() as f64;
        if pixels > max_pixels as f64 {
            scale = scale.min((max_pixels as f64 / pixels).sqrt());
        }
    }
    scale
}

/// Whether a scale factor is close enough to 1.0 that resampling would be
/// imperceptible.
pub fn is_negligible(scale: f64, epsilon: f64) -> bool {
    (1.0 - scale).abs() < epsilon
}

/// Apply a scale factor to both axes, rounding to the nearest pixel.
///
/// Never returns a zero-sized extent: a bitmap scaled below one pixel along
/// an axis keeps one pixel on that axis.
pub fn scaled_dimensions(source: Dimensions, scale: f64) -> Dimensions {
    let width = ((source.width as f64 * scale).round() as u32).max(1);
    let height = ((source.height as f64 * scale).round() as u32).max(1);
    Dimensions { width, height }
}
