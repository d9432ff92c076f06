//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once and handed to the
//! [`Preprocessor`](crate::process::Preprocessor), which never changes it.
//! Every field has a default, so an empty file (or no file) gives the stock
//! behaviour: orientation on, no size limits, always re-encode to JPEG at
//! quality 75.
//!
//! ## Config File Location
//!
//! `imgprep` looks for `imgprep.toml` in the working directory, or reads the
//! file given with `--config`. Command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! apply_orientation = true     # Turn EXIF-rotated images upright
//!
//! [resize]
//! # max_width = 2048           # Unset = no limit
//! # max_height = 2048
//! # max_pixels = 4000000
//! # max_megapixels = 4.0       # Same as max_pixels / 1e6; smaller limit wins
//! scale_epsilon = 0.001        # Skip scales within 0.1% of 1.0
//! use_area_average = true      # false = backend's native scaler
//! cooperative_yield = false    # Let other tasks run during long scales
//! yield_budget_ms = 10
//! yield_pause_ms = 5
//!
//! [output]
//! mime_type = "image/jpeg"
//! quality = 75                 # Only used for JPEG
//! force = true                 # Re-encode even if the input is already encoded
//! disabled = false             # Skip conversion entirely
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{CooperativeYield, Quality, SizeLimits};
use crate::naming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "imgprep.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Stage toggles and thresholds for one preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Correct EXIF orientation before anything else.
    pub apply_orientation: bool,
    /// Size limits and scaler choice.
    pub resize: ResizeConfig,
    /// Target encoding.
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            apply_orientation: true,
            resize: ResizeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resize.validate()?;
        self.output.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_pixels: Option<u64>,
    /// Pixel budget in millions; combined with `max_pixels`, the smaller wins.
    pub max_megapixels: Option<f64>,
    /// Scales closer than this to 1.0 leave the image alone.
    pub scale_epsilon: f64,
    /// Box filter when true, the backend's native scaler when false.
    pub use_area_average: bool,
    pub cooperative_yield: bool,
    pub yield_budget_ms: u64,
    pub yield_pause_ms: u64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_pixels: None,
            max_megapixels: None,
            scale_epsilon: 0.001,
            use_area_average: true,
            cooperative_yield: false,
            yield_budget_ms: 10,
            yield_pause_ms: 5,
        }
    }
}

impl ResizeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == Some(0) || self.max_height == Some(0) || self.max_pixels == Some(0) {
            return Err(ConfigError::Validation(
                "resize limits must be greater than zero".into(),
            ));
        }
        if self
            .max_megapixels
            .is_some_and(|mp| !(mp.is_finite() && mp > 0.0))
        {
            return Err(ConfigError::Validation(
                "resize.max_megapixels must be a positive number".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.scale_epsilon) {
            return Err(ConfigError::Validation(
                "resize.scale_epsilon must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }

    /// The combined limits, with megapixels folded into the pixel budget.
    pub fn size_limits(&self) -> SizeLimits {
        let from_megapixels = self
            .max_megapixels
            .map(|mp| ((mp * 1_000_000.0).round() as u64).max(1));
        let max_pixels = match (self.max_pixels, from_megapixels) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        SizeLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            max_pixels,
        }
    }

    /// A fresh yield budget for one scale, if cooperative yielding is on.
    pub fn yielder(&self) -> Option<CooperativeYield> {
        self.cooperative_yield.then(|| {
            CooperativeYield::new(
                Duration::from_millis(self.yield_budget_ms),
                Duration::from_millis(self.yield_pause_ms),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub mime_type: String,
    /// Encoder quality 1-100. Dropped for formats other than JPEG.
    pub quality: Option<u32>,
    /// Re-encode images that arrive already encoded.
    pub force: bool,
    /// Skip the conversion stage.
    pub disabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            quality: Some(75),
            force: true,
            disabled: false,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !naming::is_known_image_mime(&self.mime_type) {
            return Err(ConfigError::Validation(format!(
                "output.mime_type '{}' is not a known image type",
                self.mime_type
            )));
        }
        if self.quality.is_some_and(|q| !(1..=100).contains(&q)) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    /// Quality to pass to the encoder: only set for JPEG.
    pub fn effective_quality(&self) -> Option<Quality> {
        self.quality
            .filter(|_| naming::accepts_quality(&self.mime_type))
            .map(Quality::new)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Unset optional limits are absent from the table.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `imgprep.toml` from `dir`, falling back to defaults when absent.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(&dir.join(CONFIG_FILE_NAME))?)
}

/// Load an explicitly named config file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    resolve_config(Some(toml::from_str(&content)?))
}

/// Returns a fully-commented stock `imgprep.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgprep Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Turn images upright according to their EXIF orientation tag.
# Skipped automatically when the decoder already does this.
apply_orientation = true

# ---------------------------------------------------------------------------
# Size limits
# ---------------------------------------------------------------------------
[resize]
# Images larger than any limit are scaled down uniformly until they fit all
# of them. Images are never scaled up. Leave a limit commented out to disable it.
# max_width = 2048
# max_height = 2048
# max_pixels = 4000000

# Pixel budget in millions. If max_pixels is also set, the smaller one wins.
# max_megapixels = 4.0

# Scale factors closer than this to 1.0 are ignored (0.001 = 0.1%).
scale_epsilon = 0.001

# true:  area-average box filter (exact, every source pixel counts)
# false: the image backend's own resampler (faster)
use_area_average = true

# Pause the box filter now and then so other work can run.
cooperative_yield = false

# With cooperative_yield on: work this long between pauses...
yield_budget_ms = 10

# ...then pause this long.
yield_pause_ms = 5

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# MIME type of the processed image.
mime_type = "image/jpeg"

# Encoder quality (1 = worst, 100 = best). Only used for JPEG.
quality = 75

# Re-encode images that are already encoded. With force = false, an encoded
# image that needed no orientation or resize is passed through untouched.
force = true

# Skip conversion entirely. The result may then be a raw bitmap.
disabled = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documentation() {
        let config = PipelineConfig::default();
        assert!(config.apply_orientation);
        assert!(config.resize.size_limits().is_unbounded());
        assert_eq!(config.resize.scale_epsilon, 0.001);
        assert!(config.resize.use_area_average);
        assert!(!config.resize.cooperative_yield);
        assert_eq!(config.output.mime_type, "image/jpeg");
        assert_eq!(config.output.quality, Some(75));
        assert!(config.output.force);
        assert!(!config.output.disabled);
    }

    #[test]
    fn parse_partial_config() {
        let overlay: toml::Value = toml::from_str(
            r#"
[resize]
max_width = 1024
"#,
        )
        .unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config.resize.max_width, Some(1024));
        assert_eq!(config.resize.max_height, None);
        // Unspecified values should be defaults
        assert_eq!(config.output.mime_type, "image/jpeg");
        assert!(config.apply_orientation);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let overlay: toml::Value = toml::from_str("[resize]\nmax_widht = 10\n").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let overlay: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn stock_defaults_omit_unset_limits() {
        let value = stock_defaults_value().unwrap();
        let resize = value.get("resize").unwrap();
        assert!(resize.get("max_width").is_none());
        assert!(resize.get("scale_epsilon").is_some());
    }

    #[test]
    fn merge_toml_overrides_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4\n").unwrap();
        let merged = merge_toml(base, overlay);
        let a = merged.get("a").unwrap();
        assert_eq!(a.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(a.get("y").unwrap().as_integer(), Some(3));
        assert_eq!(a.get("z").unwrap().as_integer(), Some(4));
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    #[test]
    fn megapixels_fold_into_pixel_budget() {
        let resize = ResizeConfig {
            max_megapixels: Some(2.0),
            ..ResizeConfig::default()
        };
        assert_eq!(resize.size_limits().max_pixels, Some(2_000_000));
    }

    #[test]
    fn smaller_pixel_budget_wins() {
        let resize = ResizeConfig {
            max_pixels: Some(1_500_000),
            max_megapixels: Some(2.0),
            ..ResizeConfig::default()
        };
        assert_eq!(resize.size_limits().max_pixels, Some(1_500_000));

        let resize = ResizeConfig {
            max_pixels: Some(3_000_000),
            max_megapixels: Some(2.0),
            ..ResizeConfig::default()
        };
        assert_eq!(resize.size_limits().max_pixels, Some(2_000_000));
    }

    #[test]
    fn quality_only_applies_to_jpeg() {
        let mut output = OutputConfig::default();
        assert_eq!(output.effective_quality(), Some(Quality::new(75)));

        output.mime_type = "image/png".into();
        assert_eq!(output.effective_quality(), None);
    }

    #[test]
    fn yielder_follows_toggle() {
        let mut resize = ResizeConfig::default();
        assert!(resize.yielder().is_none());
        resize.cooperative_yield = true;
        assert!(resize.yielder().is_some());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn expect_invalid(toml_text: &str) {
        let overlay: toml::Value = toml::from_str(toml_text).unwrap();
        let result = resolve_config(Some(overlay));
        assert!(
            matches!(result, Err(ConfigError::Validation(_))),
            "expected validation error for {toml_text:?}, got {result:?}"
        );
    }

    #[test]
    fn validation_rejects_bad_values() {
        expect_invalid("[output]\nquality = 0\n");
        expect_invalid("[output]\nquality = 101\n");
        expect_invalid("[output]\nmime_type = \"text/plain\"\n");
        expect_invalid("[resize]\nmax_width = 0\n");
        expect_invalid("[resize]\nmax_pixels = 0\n");
        expect_invalid("[resize]\nmax_megapixels = -1.0\n");
        expect_invalid("[resize]\nscale_epsilon = 1.0\n");
    }

    #[test]
    fn zero_yield_budget_is_allowed() {
        let overlay: toml::Value =
            toml::from_str("[resize]\ncooperative_yield = true\nyield_budget_ms = 0\n").unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config.resize.yield_budget_ms, 0);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
apply_orientation = false

[output]
mime_type = "image/webp"
force = false
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert!(!config.apply_orientation);
        assert_eq!(config.output.mime_type, "image/webp");
        assert!(!config.output.force);
        assert_eq!(config.output.quality, Some(75));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_file_requires_the_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
