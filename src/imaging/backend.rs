//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the bitmap codec the pipeline runs on: it
//! turns encoded bytes into an RGBA8 pixel buffer and back, and offers a
//! "native" scaled blit as the fast alternative to the box filter.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.

use super::params::Quality;
use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {mime}: {reason}")]
    Encode { mime: String, reason: String },
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Trait for bitmap codecs.
///
/// Every method is a suspension point for the calling stage. Implementations
/// must not mutate their inputs; each call produces a fresh buffer or blob.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Decode encoded bytes into an RGBA8 bitmap.
    async fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError>;

    /// Encode a bitmap to `mime_type`. `quality` is only passed for formats
    /// that take one.
    async fn encode(
        &self,
        pixels: &RgbaImage,
        mime_type: &str,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>, BackendError>;

    /// Scale with the backend's own resampler (the "native" scaler).
    async fn resize(
        &self,
        pixels: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations and replays canned bitmaps.
    ///
    /// `decode` pops from `decode_results` (last in, first out) and fails with
    /// [`BackendError::Decode`] when empty. `encode` returns a tiny fake blob
    /// tagged with the requested MIME type. `resize` returns a solid buffer of
    /// the requested size.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_results: Mutex<Vec<RgbaImage>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode {
            len: usize,
        },
        Encode {
            width: u32,
            height: u32,
            mime: String,
            quality: Option<u32>,
        },
        Resize {
            from: (u32, u32),
            to: (u32, u32),
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_decoded(bitmaps: Vec<RgbaImage>) -> Self {
            Self {
                decode_results: Mutex::new(bitmaps),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn decode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Decode { .. }))
                .count()
        }
    }

    #[async_trait]
    impl ImageBackend for MockBackend {
        async fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode { len: bytes.len() });
            // Give concurrent callers a chance to interleave
            tokio::task::yield_now().await;

            self.decode_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::Decode("No mock bitmap".to_string()))
        }

        async fn encode(
            &self,
            pixels: &RgbaImage,
            mime_type: &str,
            quality: Option<Quality>,
        ) -> Result<Vec<u8>, BackendError> {
            if mime_type == "image/x-unsupported" {
                return Err(BackendError::UnsupportedFormat(mime_type.to_string()));
            }
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width: pixels.width(),
                height: pixels.height(),
                mime: mime_type.to_string(),
                quality: quality.map(Quality::value),
            });
            Ok(format!("{mime_type};{}x{}", pixels.width(), pixels.height()).into_bytes())
        }

        async fn resize(
            &self,
            pixels: &RgbaImage,
            width: u32,
            height: u32,
        ) -> Result<RgbaImage, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                from: pixels.dimensions(),
                to: (width, height),
            });
            Ok(RgbaImage::new(width, height))
        }
    }

    #[tokio::test]
    async fn mock_records_decode() {
        let backend = MockBackend::with_decoded(vec![RgbaImage::new(800, 600)]);

        let result = backend.decode(b"fake").await.unwrap();
        assert_eq!(result.dimensions(), (800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode { len: 4 }]);
    }

    #[tokio::test]
    async fn mock_decode_fails_when_exhausted() {
        let backend = MockBackend::new();
        let result = backend.decode(b"fake").await;
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn mock_records_encode() {
        let backend = MockBackend::new();

        let bytes = backend
            .encode(&RgbaImage::new(4, 3), "image/jpeg", Some(Quality::new(90)))
            .await
            .unwrap();
        assert_eq!(bytes, b"image/jpeg;4x3");

        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Encode {
                width: 4,
                height: 3,
                quality: Some(90),
                ..
            }
        ));
    }

    #[test]
    fn error_messages_name_the_format() {
        let e = BackendError::Encode {
            mime: "image/webp".into(),
            reason: "boom".into(),
        };
        assert_eq!(e.to_string(), "Failed to encode image/webp: boom");
        let e = BackendError::InvalidDimensions {
            width: 0,
            height: 3,
        };
        assert_eq!(e.to_string(), "Invalid dimensions: 0x3");
    }
}
