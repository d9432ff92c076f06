//! # imgprep
//!
//! Upload-side image preprocessing. Before a user's photo is sent anywhere it
//! should display the right way up, fit the size limits of wherever it is
//! going, and be in a format the receiver accepts. `imgprep` does exactly
//! those three things and nothing else.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Orient    EXIF orientation  →  upright bitmap    (lossless redraw)
//! 2. Resize    size limits       →  smaller bitmap    (area-average box filter)
//! 3. Convert   target MIME type  →  encoded bytes     (JPEG q75 by default)
//! ```
//!
//! Each stage passes its input through untouched when it has nothing to do,
//! so an image that already satisfies everything costs no decode and keeps
//! its original bytes. The value flowing between stages is an [`types::Image`]:
//! either encoded bytes or a decoded bitmap, converted lazily.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | The [`Preprocessor`](process::Preprocessor) orchestrator and its three stages |
//! | [`types`] | `Image`, `EncodedImage`, `DecodedImage` |
//! | [`orientation`] | Orientation transforms, decoder probe, correction policy |
//! | [`imaging`] | Codec backend trait, `image`-crate backend, scale math, box filter |
//! | [`metadata`] | EXIF reading via `kamadak-exif` |
//! | [`registrar`] | Revocable display handles for encoded bytes |
//! | [`config`] | `imgprep.toml` loading, validation, and merging |
//! | [`naming`] | MIME type ↔ file extension helpers |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Probe the Decoder Instead of Guessing
//!
//! Whether a decoder applies EXIF orientation varies between codecs and
//! versions. Rather than hard-coding an answer, the pipeline decodes a tiny
//! orientation-tagged JPEG once and looks at the first pixel. The answer is
//! cached in an [`OrientationDetector`](orientation::OrientationDetector)
//! shared by every preprocessor that uses the same backend.
//!
//! ## Exact Integer Box Filter
//!
//! Downscaling averages every source pixel into its target cell using integer
//! sums and a Bresenham-style stepper, so any ratio, integral or not, gives a
//! true area average with no rounding drift. It can pause between rows to let
//! other tasks run on a single-threaded runtime.
//!
//! ## Collaborators Behind Traits
//!
//! The codec ([`imaging::ImageBackend`]), EXIF reader
//! ([`metadata::ExifReader`]) and display-handle registrar
//! ([`registrar::ResourceRegistrar`]) are traits. Production implementations
//! use the `image`, `kamadak-exif` and `tempfile` crates; tests swap in
//! recording mocks.

pub mod config;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod orientation;
pub mod output;
pub mod process;
pub mod registrar;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
