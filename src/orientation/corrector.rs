//! Orientation correction policy.

use super::detector::OrientationDetector;
use super::transform::orient_bitmap;
use crate::imaging::{BackendError, Dimensions, ImageBackend};
use crate::metadata::ExifReader;
use crate::types::{DecodedImage, Image};
use tracing::debug;

/// Result of [`correct_orientation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Oriented {
    pub image: Image,
    /// The orientation code that was applied, if the image was redrawn.
    pub applied: Option<u32>,
    /// Extent of the bitmap before it was redrawn.
    pub source: Option<Dimensions>,
}

impl Oriented {
    fn unchanged(image: Image) -> Self {
        Self {
            image,
            applied: None,
            source: None,
        }
    }
}

/// Return `image` turned upright according to its EXIF orientation.
///
/// The input comes back untouched, and without being decoded, when:
/// - it is already a bitmap (no metadata left to read)
/// - it carries no orientation, or code 0
/// - the backend's decoder already applies orientation
///
/// Otherwise the image is decoded, redrawn through the orientation transform
/// and returned as a [`DecodedImage`] with the same name. Code 1 takes this
/// path too: the redraw is an identity copy, but the result is a bitmap.
pub async fn correct_orientation(
    image: Image,
    backend: &dyn ImageBackend,
    exif_reader: &dyn ExifReader,
    detector: &OrientationDetector,
) -> Result<Oriented, BackendError> {
    let encoded = match image {
        Image::Encoded(encoded) => encoded,
        decoded => {
            debug!("Orientation skipped: image is already decoded");
            return Ok(Oriented::unchanged(decoded));
        }
    };

    let tags = exif_reader.read(encoded.as_bytes()).await;
    let code = match tags.orientation() {
        None | Some(0) => {
            debug!("Orientation skipped: no orientation code");
            return Ok(Oriented::unchanged(Image::Encoded(encoded)));
        }
        Some(code) => code,
    };

    if detector.is_honored(backend).await {
        debug!(code, "Orientation skipped: decoder already applies it");
        return Ok(Oriented::unchanged(Image::Encoded(encoded)));
    }

    let decoded = encoded.decode(backend).await?;
    let upright = orient_bitmap(decoded.pixels(), code);
    debug!(
        code,
        from = %decoded.dimensions(),
        to = %Dimensions::from(upright.dimensions()),
        "Corrected orientation"
    );
    Ok(Oriented {
        image: Image::Decoded(
            DecodedImage::new(upright).with_name_opt(encoded.name().map(str::to_string)),
        ),
        applied: Some(code),
        source: Some(decoded.dimensions()),
    })
}
