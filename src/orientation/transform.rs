//! EXIF orientation codes as affine transforms.
//!
//! | Code | Meaning | Axes swapped |
//! |---|---|---|
//! | 1 | upright | no |
//! | 2 | mirrored horizontally | no |
//! | 3 | rotated 180° | no |
//! | 4 | mirrored vertically | no |
//! | 5 | mirrored horizontally, rotated 270° CW (transpose) | yes |
//! | 6 | rotated 90° CW | yes |
//! | 7 | mirrored horizontally, rotated 90° CW (transverse) | yes |
//! | 8 | rotated 270° CW | yes |
//!
//! The transform is kept as a 2×3 matrix `[a, b, c, d, e, f]` mapping a
//! source point to `(a·x + c·y + e, b·x + d·y + f)`. The 2×2 linear part
//! only ever holds one `±1` per row, so redrawing is an exact pixel
//! permutation and orientation correction never resamples.

use crate::imaging::Dimensions;
use image::RgbaImage;

/// Highest orientation code defined by EXIF.
pub const MAX_ORIENTATION: u32 = 8;

/// The affine transform that turns a stored bitmap upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationTransform {
    /// `[a, b, c, d, e, f]`
    pub matrix: [i64; 6],
    /// Extent of the upright bitmap.
    pub target: Dimensions,
}

impl OrientationTransform {
    /// Build the transform for `code` applied to a bitmap of size `source`.
    ///
    /// Returns `None` for code 0 and for anything outside 1–8.
    pub fn for_code(code: u32, source: Dimensions) -> Option<Self> {
        if code == 0 || code > MAX_ORIENTATION {
            return None;
        }
        let swaps_axes = code > 4;
        let target = if swaps_axes {
            source.transposed()
        } else {
            source
        };

        let x = usize::from(swaps_axes);
        let y = 1 - x;
        let xs: i64 = if (code & 3) >> 1 != 0 { -1 } else { 1 };
        let ys: i64 = if ((code - 1) & 3) >> 1 != 0 { -1 } else { 1 };

        let mut matrix = [0i64; 6];
        matrix[2 * x] = xs;
        matrix[2 * y + 1] = ys;
        matrix[4] = -(target.width as i64) * xs.min(0);
        matrix[5] = -(target.height as i64) * ys.min(0);

        Some(Self { matrix, target })
    }

    /// Map the source pixel `(x, y)` to its upright position.
    ///
    /// Works on doubled coordinates so pixel centres stay integral: a mirrored
    /// axis sends column `u` to `extent - 1 - u`.
    pub fn map_pixel(&self, x: u32, y: u32) -> (u32, u32) {
        let [a, b, c, d, e, f] = self.matrix;
        let cx = 2 * x as i64 + 1;
        let cy = 2 * y as i64 + 1;
        let dx = a * cx + c * cy + 2 * e;
        let dy = b * cx + d * cy + 2 * f;
        (((dx - 1) / 2) as u32, ((dy - 1) / 2) as u32)
    }

    /// Redraw `src` into a new buffer of the upright size.
    pub fn apply(&self, src: &RgbaImage) -> RgbaImage {
        let mut dst = RgbaImage::new(self.target.width, self.target.height);
        for (x, y, px) in src.enumerate_pixels() {
            let (dx, dy) = self.map_pixel(x, y);
            dst.put_pixel(dx, dy, *px);
        }
        dst
    }
}

/// Return an upright copy of `src` for orientation `code`.
///
/// Code 0 and codes outside 1–8 produce a straight copy.
pub fn orient_bitmap(src: &RgbaImage, code: u32) -> RgbaImage {
    match OrientationTransform::for_code(code, src.dimensions().into()) {
        Some(transform) => transform.apply(src),
        None => src.clone(),
    }
}

/// The orientation code that undoes `code`.
///
/// The two quarter turns invert each other; every other code is its own
/// inverse.
pub fn inverse_code(code: u32) -> u32 {
    match code {
        6 => 8,
        8 => 6,
        other => other,
    }
}
