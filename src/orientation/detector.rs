//! One-shot detection of decoder-side orientation support.
//!
//! The probe is a tiny JPEG (8 wide, 16 tall) tagged with orientation 6.
//! Its top half is black and its bottom half white. A decoder that ignores
//! the tag returns it as stored, with a black first pixel. A decoder that
//! applies the tag rotates it a quarter turn clockwise, which brings the
//! bottom-left corner (white) to the origin. Both halves are flat 8×8 blocks,
//! so the decoded values are exact.

use crate::imaging::ImageBackend;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Orientation-tagged reference image decoded by the probe.
pub const PROBE_JPEG: &[u8] = include_bytes!("probe.jpg");

/// Every colour channel of the first pixel must exceed this for the decoder
/// to count as honouring orientation.
const BRIGHTNESS_THRESHOLD: u8 = 200;

/// What is known about the backend's orientation handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationState {
    /// No detection has completed yet.
    Unknown,
    /// Decoding already applies EXIF orientation.
    Honored,
    /// Decoding returns pixels in stored order.
    NotHonored,
}

/// Caches the probe result for the lifetime of the detector.
///
/// At most one probe ever runs. Callers that arrive while it is in flight
/// wait for the same result instead of starting their own. Share one
/// detector (behind an `Arc`) between everything that uses the same backend.
#[derive(Debug, Default)]
pub struct OrientationDetector {
    honored: OnceCell<bool>,
}

impl OrientationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector whose answer is already known, so no probe runs.
    pub fn resolved(honored: bool) -> Self {
        Self {
            honored: OnceCell::new_with(Some(honored)),
        }
    }

    pub fn state(&self) -> OrientationState {
        match self.honored.get() {
            None => OrientationState::Unknown,
            Some(true) => OrientationState::Honored,
            Some(false) => OrientationState::NotHonored,
        }
    }

    /// Whether `backend` applies EXIF orientation while decoding.
    ///
    /// The first call decodes the probe; later calls return the cached answer.
    pub async fn is_honored(&self, backend: &dyn ImageBackend) -> bool {
        *self.honored.get_or_init(|| probe(backend)).await
    }
}

/// Decode the probe straight through the backend and inspect its first pixel.
async fn probe(backend: &dyn ImageBackend) -> bool {
    let pixels = match backend.decode(PROBE_JPEG).await {
        Ok(pixels) => pixels,
        Err(e) => {
            warn!("Orientation probe failed to decode, assuming not honored: {e}");
            return false;
        }
    };

    let honored = pixels
        .pixels()
        .next()
        .is_some_and(|px| px.0[..3].iter().all(|&c| c > BRIGHTNESS_THRESHOLD));
    info!(honored, "Detected decoder orientation support");
    honored
}
