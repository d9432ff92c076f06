//! Pure Rust bitmap codec built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Auto-orient on decode (opt-in) | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (alpha dropped, quality honoured) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG, WebP, TIFF | `DynamicImage::write_to` (lossless) |
//! | Native resize | `image::imageops::resize` with `Triangle` filter |

use super::backend::{BackendError, ImageBackend};
use super::params::Quality;
use async_trait::async_trait;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader,
    RgbaImage,
};
use std::io::Cursor;
use std::sync::LazyLock;

/// Output formats whose encoders are compiled in.
const OUTPUT_CANDIDATES: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Avif,
    ImageFormat::Tiff,
];

static SUPPORTED_OUTPUT_TYPES: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    OUTPUT_CANDIDATES
        .iter()
        .filter(|fmt| fmt.writing_enabled())
        .map(|fmt| fmt.to_mime_type())
        .collect()
});

/// Returns the MIME types [`RustBackend`] can encode to.
pub fn supported_output_types() -> &'static [&'static str] {
    &SUPPORTED_OUTPUT_TYPES
}

/// Sniff the MIME type of encoded bytes from their magic number.
pub fn guess_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Bitmap codec using the `image` crate ecosystem.
///
/// By default decoding ignores embedded orientation, like most native
/// decoders. [`RustBackend::auto_orienting`] builds a backend whose decoder
/// applies it, which the orientation detector then picks up.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    auto_orient: bool,
}

impl RustBackend {
    pub fn new() -> Self {
        Self { auto_orient: false }
    }

    /// A backend whose decode path honours EXIF orientation.
    pub fn auto_orienting() -> Self {
        Self { auto_orient: true }
    }

    pub fn honors_orientation(&self) -> bool {
        self.auto_orient
    }
}

fn decode_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Decode(e.to_string())
}

/// Sniff, decode and normalise to RGBA8.
fn decode_bytes(bytes: &[u8], auto_orient: bool) -> Result<RgbaImage, BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(decode_error)?;
    if reader.format().is_none() {
        return Err(BackendError::Decode("unrecognised image format".into()));
    }
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = if auto_orient {
        decoder.orientation().map_err(decode_error)?
    } else {
        Orientation::NoTransforms
    };
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    img.apply_orientation(orientation);
    Ok(img.into_rgba8())
}

/// Encode an RGBA8 bitmap into the format named by `mime_type`.
fn encode_bitmap(
    pixels: &RgbaImage,
    mime_type: &str,
    quality: Option<Quality>,
) -> Result<Vec<u8>, BackendError> {
    let format = ImageFormat::from_mime_type(mime_type)
        .filter(|f| OUTPUT_CANDIDATES.contains(f) && f.writing_enabled())
        .ok_or_else(|| BackendError::UnsupportedFormat(mime_type.to_string()))?;

    let (width, height) = pixels.dimensions();
    let quality = quality.unwrap_or_default().value() as u8;
    let mut buf = Vec::new();

    let result = match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        ImageFormat::Avif => AvifEncoder::new_with_speed_quality(&mut buf, 6, quality)
            .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8),
        other => DynamicImage::ImageRgba8(pixels.clone()).write_to(&mut Cursor::new(&mut buf), other),
    };

    result.map_err(|e| BackendError::Encode {
        mime: mime_type.to_string(),
        reason: e.to_string(),
    })?;
    Ok(buf)
}

#[async_trait]
impl ImageBackend for RustBackend {
    async fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
        decode_bytes(bytes, self.auto_orient)
    }

    async fn encode(
        &self,
        pixels: &RgbaImage,
        mime_type: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>, BackendError> {
        encode_bitmap(pixels, mime_type, quality)
    }

    async fn resize(
        &self,
        pixels: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidDimensions { width, height });
        }
        Ok(image::imageops::resize(
            pixels,
            width,
            height,
            FilterType::Triangle,
        ))
    }
}
