//! Area-averaging ("box filter") scaler.
//!
//! Every target pixel is the unweighted mean of the source pixels that fall
//! inside its footprint. Footprints are tracked with two running remainders
//! (`txc` across a row, `tyc` down the columns) instead of a floating-point
//! ratio, which makes the mapping exact for any pair of integer extents:
//! `sw` source columns are distributed over `tw` target columns by adding
//! `tw` per source column and rolling over every time the remainder reaches
//! `sw`, exactly like a Bresenham line stepper.
//!
//! When shrinking an axis each source pixel lands in exactly one target cell,
//! the one current when it is read. When growing an axis a source pixel
//! whose span crosses a target boundary is also counted in the next cell,
//! otherwise some target cells would receive nothing.
//!
//! The scaler is plain integer arithmetic with `u64` channel sums, so results
//! never drift across rows and never leave the min–max range of their inputs.
//!
//! ## Cooperative yielding
//!
//! On a single-threaded runtime a 40-megapixel downscale would otherwise hold
//! the scheduler for a long time. With a [`CooperativeYield`] the loop checks
//! the clock once per source row and sleeps briefly whenever its budget has
//! elapsed.

use super::backend::BackendError;
use image::RgbaImage;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Per-row time budget for [`area_average`].
#[derive(Debug)]
pub struct CooperativeYield {
    budget: Duration,
    pause: Duration,
    last_yield: Instant,
    yields: usize,
}

impl CooperativeYield {
    /// Yield for `pause` whenever more than `budget` has passed since the
    /// previous yield.
    pub fn new(budget: Duration, pause: Duration) -> Self {
        Self {
            budget,
            pause,
            last_yield: Instant::now(),
            yields: 0,
        }
    }

    /// Number of times the scaler has suspended so far.
    pub fn yields(&self) -> usize {
        self.yields
    }

    async fn checkpoint(&mut self) {
        if self.last_yield.elapsed() < self.budget {
            return;
        }
        trace!(pause_ms = self.pause.as_millis() as u64, "box filter yielding");
        tokio::time::sleep(self.pause).await;
        self.yields += 1;
        self.last_yield = Instant::now();
    }
}

impl Default for CooperativeYield {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_millis(5))
    }
}

/// Running channel sums for one row of target pixels.
struct RowAccumulator {
    sums: Vec<[u64; 4]>,
    counts: Vec<u64>,
}

impl RowAccumulator {
    fn new(width: usize) -> Self {
        Self {
            sums: vec![[0; 4]; width],
            counts: vec![0; width],
        }
    }

    fn add_pixel(&mut self, column: usize, px: &[u8; 4]) {
        let sum = &mut self.sums[column];
        for (s, &c) in sum.iter_mut().zip(px) {
            *s += c as u64;
        }
        self.counts[column] += 1;
    }

    fn add_row(&mut self, other: &RowAccumulator) {
        for (column, (sum, &count)) in other.sums.iter().zip(&other.counts).enumerate() {
            for (s, &o) in self.sums[column].iter_mut().zip(sum) {
                *s += o;
            }
            self.counts[column] += count;
        }
    }

    fn clear(&mut self) {
        self.sums.fill([0; 4]);
        self.counts.fill(0);
    }

    /// Divide out the averages into row `y` of `dst`.
    fn flush_into(&self, dst: &mut RgbaImage, y: u32) {
        for (x, (sum, &count)) in self.sums.iter().zip(&self.counts).enumerate() {
            if count == 0 {
                continue;
            }
            let px = dst.get_pixel_mut(x as u32, y);
            for (out, &s) in px.0.iter_mut().zip(sum) {
                *out = (s / count) as u8;
            }
        }
    }
}

/// Distribute one source row over the target columns.
fn accumulate_row(src: &RgbaImage, sy: u32, row: &mut RowAccumulator) {
    let sw = src.width() as u64;
    let tw = row.sums.len() as u64;
    let upscale = tw > sw;
    let mut tx = 0usize;
    let mut txc = 0u64;

    for sx in 0..src.width() {
        let px = &src.get_pixel(sx, sy).0;
        row.add_pixel(tx, px);
        txc += tw;
        while txc >= sw {
            txc -= sw;
            tx += 1;
            // Growing: the pixel reaches into the next column
            if upscale && txc > 0 && (tx as u64) < tw {
                row.add_pixel(tx, px);
            }
        }
    }
}

/// Scale `src` to `width × height` by area averaging.
///
/// Equal extents short-circuit to a plain copy. Pass a [`CooperativeYield`]
/// to let other tasks run during long scales.
pub async fn area_average(
    src: &RgbaImage,
    width: u32,
    height: u32,
    mut yielder: Option<&mut CooperativeYield>,
) -> Result<RgbaImage, BackendError> {
    let (sw, sh) = src.dimensions();
    if width == 0 || height == 0 || sw == 0 || sh == 0 {
        return Err(BackendError::InvalidDimensions { width, height });
    }
    if (sw, sh) == (width, height) {
        return Ok(src.clone());
    }

    let mut dst = RgbaImage::new(width, height);
    let mut row = RowAccumulator::new(width as usize);
    let mut acc = RowAccumulator::new(width as usize);
    let (sh, th) = (sh as u64, height as u64);
    let upscale = th > sh;
    let mut ty = 0u32;
    let mut tyc = 0u64;

    for sy in 0..src.height() {
        if let Some(y) = yielder.as_deref_mut() {
            y.checkpoint().await;
        }

        row.clear();
        accumulate_row(src, sy, &mut row);
        acc.add_row(&row);

        tyc += th;
        while tyc >= sh {
            tyc -= sh;
            acc.flush_into(&mut dst, ty);
            acc.clear();
            ty += 1;
            // Growing: the row reaches into the next target row
            if upscale && tyc > 0 && (ty as u64) < th {
                acc.add_row(&row);
            }
        }
    }

    Ok(dst)
}
