//! EXIF orientation handling.
//!
//! Cameras store pixels in sensor order and record how to turn them upright
//! in the EXIF `Orientation` tag. Some decoders apply that tag, most don't.
//! Correcting an image the decoder already rotated would rotate it twice, so
//! correction is gated on a one-time probe of the decoder:
//!
//! - [`transform`]: orientation code → pixel-exact affine redraw
//! - [`detector`]: does the backend already honour orientation?
//! - [`corrector`]: the policy tying metadata, detection and redraw together

pub mod corrector;
pub mod detector;
pub mod transform;

pub use corrector::{Oriented, correct_orientation};
pub use detector::{OrientationDetector, OrientationState, PROBE_JPEG};
pub use transform::{MAX_ORIENTATION, OrientationTransform, inverse_code, orient_bitmap};
