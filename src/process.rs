//! The preprocessing pipeline.
//!
//! A [`Preprocessor`] runs three stages over one image, always in this order:
//!
//! ```text
//! Image ─▶ orient ─▶ resize ─▶ convert ─▶ Image
//! ```
//!
//! - **orient**: turn EXIF-rotated images upright (skipped when the decoder
//!   already does it, see [`orientation`](crate::orientation))
//! - **resize**: shrink uniformly until every configured limit holds
//! - **convert**: encode to the target MIME type
//!
//! Each stage may pass its input through untouched, either because config
//! switches it off or because it has nothing to do. An encoded JPEG without
//! orientation that already fits the limits leaves with its original bytes.
//!
//! ## Default Configuration
//!
//! ```text
//! Orientation: on
//! Size limits: none
//! Output: image/jpeg, quality 75, forced
//! ```
//!
//! With these defaults the result is always an encoded JPEG.
//!
//! ## Concurrency
//!
//! Stages within one call run strictly one after another. Separate calls
//! share nothing but the [`OrientationDetector`], which probes the backend at
//! most once for all of them.

use crate::config::{ConfigError, PipelineConfig};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, area_average, calculate_scale, is_negligible,
    scaled_dimensions,
};
use crate::metadata::ExifReader;
use crate::orientation::{OrientationDetector, correct_orientation};
use crate::registrar::RegistrarError;
use crate::types::{DecodedImage, Image};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Display handle error: {0}")]
    Registrar(#[from] RegistrarError),
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Orientation,
    Resize,
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Orientation => "orientation",
            Stage::Resize => "resize",
            Stage::Convert => "convert",
        })
    }
}

/// What a pipeline run did, for display.
///
/// Dimensions are only known when some stage decoded the image. An encoded
/// input that passes straight through reports none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessReport {
    pub name: Option<String>,
    pub input_mime: Option<String>,
    pub output_mime: Option<String>,
    pub input_dimensions: Option<Dimensions>,
    pub output_dimensions: Option<Dimensions>,
    /// Orientation code applied, when the image was redrawn.
    pub orientation: Option<u32>,
    /// Stages that produced a new image, in order.
    pub changed: Vec<Stage>,
    /// Size of the encoded output.
    pub output_bytes: Option<usize>,
}

impl ProcessReport {
    fn saw(&mut self, dims: Dimensions) {
        self.input_dimensions.get_or_insert(dims);
        self.output_dimensions = Some(dims);
    }
}

/// Runs the orient → resize → convert pipeline with one fixed config.
///
/// Cheap to clone; clones share the backend, the EXIF reader, the config
/// and the orientation detector.
#[derive(Clone)]
pub struct Preprocessor {
    backend: Arc<dyn ImageBackend>,
    exif_reader: Arc<dyn ExifReader>,
    detector: Arc<OrientationDetector>,
    config: Arc<PipelineConfig>,
}

impl Preprocessor {
    /// Build a preprocessor with its own, not yet run, orientation detector.
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        exif_reader: Arc<dyn ExifReader>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            backend,
            exif_reader,
            detector: Arc::new(OrientationDetector::new()),
            config: Arc::new(config),
        }
    }

    /// Share an orientation detector, so preprocessors over the same backend
    /// probe it only once between them.
    pub fn with_detector(mut self, detector: Arc<OrientationDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &Arc<OrientationDetector> {
        &self.detector
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    /// Run every stage and return the final image.
    pub async fn process(&self, image: Image) -> Result<Image, ProcessError> {
        Ok(self.process_with_report(image).await?.0)
    }

    /// Run every stage and describe what happened.
    #[instrument(skip_all, fields(name = image.name()))]
    pub async fn process_with_report(
        &self,
        image: Image,
    ) -> Result<(Image, ProcessReport), ProcessError> {
        let mut report = ProcessReport {
            name: image.name().map(str::to_string),
            input_mime: image.mime_type().map(str::to_string),
            ..ProcessReport::default()
        };
        if let Image::Decoded(d) = &image {
            report.saw(d.dimensions());
        }

        let image = self.orient_stage(image, &mut report).await?;
        let image = self.resize_stage(image, &mut report).await?;
        let image = self.convert_stage(image, &mut report).await?;

        report.output_mime = image.mime_type().map(str::to_string);
        if let Image::Encoded(e) = &image {
            report.output_bytes = Some(e.len());
        }
        debug!(changed = ?report.changed, "Pipeline finished");
        Ok((image, report))
    }

    /// The orientation stage on its own.
    pub async fn orient(&self, image: Image) -> Result<Image, ProcessError> {
        self.orient_stage(image, &mut ProcessReport::default()).await
    }

    /// The resize stage on its own.
    pub async fn resize(&self, image: Image) -> Result<Image, ProcessError> {
        self.resize_stage(image, &mut ProcessReport::default()).await
    }

    /// The conversion stage on its own.
    pub async fn convert(&self, image: Image) -> Result<Image, ProcessError> {
        self.convert_stage(image, &mut ProcessReport::default()).await
    }

    async fn orient_stage(
        &self,
        image: Image,
        report: &mut ProcessReport,
    ) -> Result<Image, ProcessError> {
        if !self.config.apply_orientation {
            debug!("Orientation stage disabled");
            return Ok(image);
        }
        let oriented = correct_orientation(
            image,
            self.backend.as_ref(),
            self.exif_reader.as_ref(),
            &self.detector,
        )
        .await?;

        if let (Some(code), Some(source), Image::Decoded(d)) =
            (oriented.applied, oriented.source, &oriented.image)
        {
            report.saw(source);
            report.saw(d.dimensions());
            report.orientation = Some(code);
            report.changed.push(Stage::Orientation);
        }
        Ok(oriented.image)
    }

    async fn resize_stage(
        &self,
        image: Image,
        report: &mut ProcessReport,
    ) -> Result<Image, ProcessError> {
        let resize = &self.config.resize;
        let limits = resize.size_limits();
        if limits.is_unbounded() {
            debug!("Resize skipped: no size limits");
            return Ok(image);
        }

        // Keep the encoded form around in case no scaling is needed
        let (original, bitmap) = match image {
            Image::Encoded(e) => {
                let bitmap = e.decode(self.backend.as_ref()).await?;
                (Some(e), bitmap)
            }
            Image::Decoded(d) => (None, d),
        };
        let source = bitmap.dimensions();
        report.saw(source);

        let scale = calculate_scale(source, &limits);
        let target = scaled_dimensions(source, scale);
        if is_negligible(scale, resize.scale_epsilon) || target == source {
            debug!(scale, %source, "Resize skipped: scale is negligible");
            return Ok(match original {
                Some(e) => Image::Encoded(e),
                None => Image::Decoded(bitmap),
            });
        }

        debug!(scale, from = %source, to = %target, area_average = resize.use_area_average, "Resizing");
        let pixels = if resize.use_area_average {
            let mut yielder = resize.yielder();
            area_average(bitmap.pixels(), target.width, target.height, yielder.as_mut()).await?
        } else {
            self.backend
                .resize(bitmap.pixels(), target.width, target.height)
                .await?
        };

        report.saw(target);
        report.changed.push(Stage::Resize);
        Ok(Image::Decoded(
            DecodedImage::new(pixels).with_name_opt(bitmap.name().map(str::to_string)),
        ))
    }

    async fn convert_stage(
        &self,
        image: Image,
        report: &mut ProcessReport,
    ) -> Result<Image, ProcessError> {
        let output = &self.config.output;
        if output.disabled {
            debug!("Convert stage disabled");
            return Ok(image);
        }
        if !output.force && image.is_encoded() {
            debug!("Convert skipped: already encoded and not forced");
            return Ok(image);
        }
        if image
            .mime_type()
            .is_some_and(|m| m.eq_ignore_ascii_case(&output.mime_type))
        {
            debug!(mime = %output.mime_type, "Convert skipped: already in target format");
            return Ok(image);
        }

        let bitmap = image.into_decoded(self.backend.as_ref()).await?;
        report.saw(bitmap.dimensions());
        let encoded = bitmap
            .encode(
                self.backend.as_ref(),
                &output.mime_type,
                output.effective_quality(),
            )
            .await?;
        debug!(mime = %output.mime_type, bytes = encoded.len(), "Converted");
        report.changed.push(Stage::Convert);
        Ok(Image::Encoded(encoded))
    }
}
