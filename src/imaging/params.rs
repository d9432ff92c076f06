//! Small value types shared between the pipeline and the backend.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`Dimensions`]: A `width × height` pair, used for bitmaps and scale targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Width and height of a bitmap, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count, widened so 65535×65535 bitmaps don't overflow.
    pub fn pixels(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The same extent with the axes exchanged (for 90° rotations).
    pub fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn dimensions_pixels_do_not_overflow() {
        let dims = Dimensions::new(65_535, 65_535);
        assert_eq!(dims.pixels(), 4_294_836_225);
    }

    #[test]
    fn dimensions_transpose_and_display() {
        let dims = Dimensions::new(4, 3);
        assert_eq!(dims.transposed(), Dimensions::new(3, 4));
        assert_eq!(dims.to_string(), "4x3");
        assert!(Dimensions::new(0, 3).is_empty());
    }
}
