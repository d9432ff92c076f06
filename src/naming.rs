//! MIME type and filename conventions.
//!
//! Images travel with a MIME type, files on disk with an extension. This
//! module maps between the two and derives names for converted output:
//!
//! - `photo.heic` encoded as JPEG → `photo.jpg`
//! - `scan` encoded as PNG → `scan.png`
//! - `IMG_0042.JPG` read from disk → `image/jpeg`

use std::path::{Path, PathBuf};

/// Known image types: MIME type, canonical extension, then aliases.
const IMAGE_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg", "jpe", "jfif"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/avif", &["avif"]),
    ("image/tiff", &["tiff", "tif"]),
    ("image/gif", &["gif"]),
    ("image/bmp", &["bmp"]),
    ("image/heic", &["heic"]),
    ("image/heif", &["heif"]),
];

/// Canonical file extension for a MIME type (`image/jpeg` → `jpg`).
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(mime_type))
        .map(|(_, exts)| exts[0])
}

/// MIME type for a file extension, case-insensitive.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(_, exts)| exts.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .map(|(mime, _)| *mime)
}

/// MIME type implied by a path's extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(mime_for_extension)
}

pub fn is_known_image_mime(mime_type: &str) -> bool {
    extension_for_mime(mime_type).is_some()
}

/// Whether encoding to `mime_type` takes a quality setting.
///
/// Only JPEG does; for everything else the quality is dropped before
/// encoding.
pub fn accepts_quality(mime_type: &str) -> bool {
    mime_type.eq_ignore_ascii_case("image/jpeg")
}

/// Rewrite a display name's extension to match `mime_type`.
///
/// Names without an extension get one appended. Unknown MIME types leave the
/// name as is.
pub fn rename_for_mime(name: &str, mime_type: &str) -> String {
    let Some(ext) = extension_for_mime(mime_type) else {
        return name.to_string();
    };
    let path = Path::new(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(current) if mime_for_extension(current) == canonical_mime(mime_type) => {
            name.to_string()
        }
        Some(_) => path.with_extension(ext).to_string_lossy().into_owned(),
        None => format!("{name}.{ext}"),
    }
}

/// The canonical MIME string for a possibly differently-cased input.
fn canonical_mime(mime_type: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(mime_type))
        .map(|(mime, _)| *mime)
}

/// Default output path for a processed file: next to the input, with a
/// `.processed` marker and the extension of the output type.
///
/// `shots/IMG_0042.HEIC` → `shots/IMG_0042.processed.jpg`
pub fn default_output_path(input: &Path, mime_type: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = extension_for_mime(mime_type).unwrap_or("bin");
    input.with_file_name(format!("{stem}.processed.{ext}"))
}
