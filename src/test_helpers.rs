//! Shared test utilities for the imgprep test suite.
//!
//! Bitmap builders with predictable pixel values, a PNG encoder for turning
//! them into real encoded bytes, and canned collaborators for the EXIF
//! reader and display-handle registrar.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = encode_png(&gradient_bitmap(40, 30));
//! let exif = StaticExifReader::with_orientation(6);
//! ```

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::metadata::{ExifReader, ExifTags, ORIENTATION_TAG, TagValue};
use crate::registrar::{DisplayHandle, RegistrarError, ResourceRegistrar};

// =========================================================================
// Bitmaps
// =========================================================================

/// A `width × height` bitmap filled with one colour.
pub fn solid_bitmap(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
}

/// A bitmap whose red channel ramps 0→255 left to right and whose green
/// channel ramps 0→255 top to bottom:
///
/// - red = `x * 255 / (width - 1)`
/// - green = `y * 255 / (height - 1)`
/// - blue = 128, alpha = 255
///
/// A single-pixel axis has a constant 0 ramp.
pub fn gradient_bitmap(width: u32, height: u32) -> RgbaImage {
    let ramp = |pos: u32, extent: u32| {
        if extent <= 1 {
            0
        } else {
            (pos * 255 / (extent - 1)) as u8
        }
    };
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([ramp(x, width), ramp(y, height), 128, 255])
    })
}

/// Encode a bitmap as PNG (lossless, no EXIF).
pub fn encode_png(bitmap: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(bitmap.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

// =========================================================================
// Collaborators
// =========================================================================

/// EXIF reader that returns the same tags for any input and counts calls.
#[derive(Default)]
pub struct StaticExifReader {
    tags: ExifTags,
    reads: AtomicUsize,
}

impl StaticExifReader {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_orientation(code: u32) -> Self {
        let mut tags = ExifTags::new();
        tags.insert(ORIENTATION_TAG, TagValue::Number(code as f64));
        Self::with_tags(tags)
    }

    pub fn with_tags(tags: ExifTags) -> Self {
        Self {
            tags,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExifReader for StaticExifReader {
    async fn read(&self, _bytes: &[u8]) -> ExifTags {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.tags.clone()
    }
}

/// In-memory registrar that hands out `mem://` handles and counts calls.
#[derive(Default)]
pub struct CountingRegistrar {
    created: Mutex<Vec<DisplayHandle>>,
    released: Mutex<Vec<u64>>,
}

impl CountingRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn released(&self) -> usize {
        self.released.lock().unwrap().len()
    }
}

impl ResourceRegistrar for CountingRegistrar {
    fn create(&self, bytes: &[u8], mime_type: &str) -> Result<DisplayHandle, RegistrarError> {
        let mut created = self.created.lock().unwrap();
        let handle = DisplayHandle {
            id: created.len() as u64 + 1,
            uri: format!("mem://{}/{}", mime_type, bytes.len()),
        };
        created.push(handle.clone());
        Ok(handle)
    }

    fn release(&self, handle: &DisplayHandle) {
        self.released.lock().unwrap().push(handle.id);
    }
}
