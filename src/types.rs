//! The image value that flows through the pipeline.
//!
//! An [`Image`] is either encoded bytes with a MIME type or a decoded RGBA8
//! bitmap. Stages accept whichever shape they are given and convert only
//! when they must: orientation correction and resizing need pixels,
//! conversion needs bytes. Conversions consume the image, so asking for the
//! shape it already has costs nothing.
//!
//! Neither shape is ever mutated in place. Every stage that changes an image
//! returns a new value.

use crate::imaging::{BackendError, Dimensions, ImageBackend, Quality};
use crate::naming;
use crate::registrar::{DisplayHandle, RegistrarError, ResourceRegistrar};
use bytes::Bytes;
use image::RgbaImage;

/// Encoded image bytes plus their MIME type.
///
/// May hold a [`DisplayHandle`] for previewing the bytes. The handle is
/// created on request only, reused while it lives, and released by the
/// caller that asked for it.
#[derive(Debug)]
pub struct EncodedImage {
    bytes: Bytes,
    mime_type: String,
    name: Option<String>,
    handle: Option<DisplayHandle>,
}

impl EncodedImage {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            name: None,
            handle: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode into a bitmap, keeping this encoded value intact.
    pub async fn decode(&self, backend: &dyn ImageBackend) -> Result<DecodedImage, BackendError> {
        let pixels = backend.decode(&self.bytes).await?;
        Ok(DecodedImage {
            pixels,
            name: self.name.clone(),
        })
    }

    /// The display handle for these bytes, created on first call.
    pub fn display_handle(
        &mut self,
        registrar: &dyn ResourceRegistrar,
    ) -> Result<&DisplayHandle, RegistrarError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => registrar.create(&self.bytes, &self.mime_type)?,
        };
        Ok(self.handle.insert(handle))
    }

    /// The handle created by [`display_handle`](Self::display_handle), if it
    /// is still live.
    pub fn cached_display_handle(&self) -> Option<&DisplayHandle> {
        self.handle.as_ref()
    }

    /// Release the display handle. Does nothing when none was created.
    pub fn release_display_handle(&mut self, registrar: &dyn ResourceRegistrar) {
        if let Some(handle) = self.handle.take() {
            registrar.release(&handle);
        }
    }
}

/// Clones share the bytes but not the display handle.
impl Clone for EncodedImage {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            mime_type: self.mime_type.clone(),
            name: self.name.clone(),
            handle: None,
        }
    }
}

/// Equality is by content; display handles are ignored.
impl PartialEq for EncodedImage {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.mime_type == other.mime_type && self.name == other.name
    }
}

/// A decoded RGBA8 bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: RgbaImage,
    name: Option<String>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels, name: None }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_name_opt(Some(name.into()))
    }

    pub fn with_name_opt(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    pub fn dimensions(&self) -> Dimensions {
        self.pixels.dimensions().into()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Encode to `mime_type`.
    ///
    /// `quality` is dropped for formats that take none. The name's extension
    /// follows the new type.
    pub async fn encode(
        &self,
        backend: &dyn ImageBackend,
        mime_type: &str,
        quality: Option<Quality>,
    ) -> Result<EncodedImage, BackendError> {
        let quality = quality.filter(|_| naming::accepts_quality(mime_type));
        let bytes = backend.encode(&self.pixels, mime_type, quality).await?;
        Ok(EncodedImage {
            bytes: Bytes::from(bytes),
            mime_type: mime_type.to_string(),
            name: self
                .name
                .as_deref()
                .map(|n| naming::rename_for_mime(n, mime_type)),
            handle: None,
        })
    }
}

/// An image in either of its two shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    Encoded(EncodedImage),
    Decoded(DecodedImage),
}

impl Image {
    pub fn name(&self) -> Option<&str> {
        match self {
            Image::Encoded(e) => e.name(),
            Image::Decoded(d) => d.name(),
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self, Image::Encoded(_))
    }

    /// MIME type of an encoded image; `None` for bitmaps.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Image::Encoded(e) => Some(e.mime_type()),
            Image::Decoded(_) => None,
        }
    }

    /// Pixel extent, decoding a copy if the image is still encoded.
    pub async fn dimensions(&self, backend: &dyn ImageBackend) -> Result<Dimensions, BackendError> {
        match self {
            Image::Encoded(e) => Ok(e.decode(backend).await?.dimensions()),
            Image::Decoded(d) => Ok(d.dimensions()),
        }
    }

    /// Convert to a bitmap. A decoded image is returned as is.
    pub async fn into_decoded(self, backend: &dyn ImageBackend) -> Result<DecodedImage, BackendError> {
        match self {
            Image::Encoded(e) => e.decode(backend).await,
            Image::Decoded(d) => Ok(d),
        }
    }

    /// Convert to encoded bytes of `mime_type`.
    ///
    /// An encoded image already of that type is returned as is. Any other
    /// encoded image is decoded and re-encoded.
    pub async fn into_encoded(
        self,
        backend: &dyn ImageBackend,
        mime_type: &str,
        quality: Option<Quality>,
    ) -> Result<EncodedImage, BackendError> {
        match self {
            Image::Encoded(e) if e.mime_type().eq_ignore_ascii_case(mime_type) => Ok(e),
            Image::Encoded(e) => {
                let decoded = e.decode(backend).await?;
                decoded.encode(backend, mime_type, quality).await
            }
            Image::Decoded(d) => d.encode(backend, mime_type, quality).await,
        }
    }
}

impl From<EncodedImage> for Image {
    fn from(image: EncodedImage) -> Self {
        Image::Encoded(image)
    }
}

impl From<DecodedImage> for Image {
    fn from(image: DecodedImage) -> Self {
        Image::Decoded(image)
    }
}
