//! Embedded metadata extraction.
//!
//! The pipeline only needs one fact from image metadata, the EXIF
//! orientation code, but the reader returns the whole primary IFD as a
//! tag-name → value map so callers (and `imgprep inspect`) can see what an
//! upload carries.
//!
//! ## Absence is not an error
//!
//! Screenshots, PNG exports, and images that went through a privacy scrubber
//! carry no EXIF at all. [`ExifReader::read`] therefore never fails: a missing
//! or unparsable EXIF block yields an empty [`ExifTags`], which the
//! orientation stage treats as "already upright".

use async_trait::async_trait;
use exif::{In, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use tracing::debug;

/// Tag name the orientation code is stored under.
pub const ORIENTATION_TAG: &str = "Orientation";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Single-component numeric tags (BYTE, SHORT, LONG, RATIONAL, …).
    Number(f64),
    /// Everything else, rendered for display.
    Text(String),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Number(n) => write!(f, "{n}"),
            TagValue::Text(s) => f.write_str(s),
        }
    }
}

/// Metadata read from an encoded image, keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTags(BTreeMap<String, TagValue>);

impl ExifTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: TagValue) {
        self.0.insert(tag.into(), value);
    }

    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.0.get(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The orientation code, if present, numeric, and integral in `0..=8`.
    pub fn orientation(&self) -> Option<u32> {
        match self.get(ORIENTATION_TAG)? {
            TagValue::Number(n) if n.fract() == 0.0 && (0.0..=8.0).contains(n) => Some(*n as u32),
            _ => None,
        }
    }
}

impl FromIterator<(String, TagValue)> for ExifTags {
    fn from_iter<I: IntoIterator<Item = (String, TagValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Trait for metadata readers.
#[async_trait]
pub trait ExifReader: Send + Sync {
    /// Read the metadata embedded in `bytes`. Returns an empty map when there
    /// is none.
    async fn read(&self, bytes: &[u8]) -> ExifTags;
}

/// [`ExifReader`] backed by `kamadak-exif`.
///
/// Understands JPEG, TIFF, HEIF, PNG and WebP containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KamadakExifReader;

impl KamadakExifReader {
    pub fn new() -> Self {
        Self
    }
}

/// Collapse a single-component numeric EXIF value into a number.
fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Byte(v) if v.len() == 1 => v[0] as f64,
        Value::Short(v) if v.len() == 1 => v[0] as f64,
        Value::Long(v) if v.len() == 1 => v[0] as f64,
        Value::SByte(v) if v.len() == 1 => v[0] as f64,
        Value::SShort(v) if v.len() == 1 => v[0] as f64,
        Value::SLong(v) if v.len() == 1 => v[0] as f64,
        Value::Rational(v) if v.len() == 1 => v[0].to_f64(),
        Value::SRational(v) if v.len() == 1 => v[0].to_f64(),
        Value::Float(v) if v.len() == 1 => v[0] as f64,
        Value::Double(v) if v.len() == 1 => v[0],
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse the primary IFD of an EXIF-bearing container.
pub fn read_exif_tags(bytes: &[u8]) -> ExifTags {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF metadata: {e}");
            return ExifTags::new();
        }
    };

    exif.fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .map(|field| {
            let value = match numeric_value(&field.value) {
                Some(n) => TagValue::Number(n),
                None => TagValue::Text(field.display_value().to_string()),
            };
            (field.tag.to_string(), value)
        })
        .collect()
}

#[async_trait]
impl ExifReader for KamadakExifReader {
    async fn read(&self, bytes: &[u8]) -> ExifTags {
        read_exif_tags(bytes)
    }
}
