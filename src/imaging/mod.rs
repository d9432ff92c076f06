//! Pixel work: codec backend, scale math, and the box-filter scaler.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | [`ImageBackend`], production impl [`RustBackend`] on the `image` crate |
//! | **Scale decision** | [`calculate_scale`], pure math over [`SizeLimits`] |
//! | **Area-average scale** | [`area_average`], integer box filter |
//! | **Native scale** | [`ImageBackend::resize`] (`image::imageops`, Triangle) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Small value types (quality, dimensions)
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Box filter**: The exact area-averaging scaler, with cooperative yielding

pub mod backend;
pub mod box_filter;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use box_filter::{CooperativeYield, area_average};
pub use calculations::{SizeLimits, calculate_scale, is_negligible, scaled_dimensions};
pub use params::{Dimensions, Quality};
pub use rust_backend::{RustBackend, guess_mime_type, supported_output_types};
