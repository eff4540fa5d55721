//! Image processing: sizing math, pixel work, and EXIF container I/O.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe** | `image::image_dimensions` |
//! | **Scaled decode** | `thumbnail_exact` prepass + Lanczos3 `resize_exact` |
//! | **Rotate + encode** | `rotate90/180/270` + JPEG/PNG encoder |
//! | **EXIF read/write** | `img-parts` container splice + `kamadak-exif` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **EXIF I/O**: [`ExifSnapshot`] read/edit/write
//! - **Operations**: Planning + executing a normalization on a backend

pub mod backend;
mod calculations;
pub mod exif_io;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{ScalePlan, calculate_sample_size, resolve_scale, rotated_dimensions};
pub use exif_io::{ExifSnapshot, MetadataError};
pub use operations::{NormalizePlan, execute_plan, may_transform, plan_normalization};
pub use params::{DecodeParams, EncodeParams, Quality, Rotation, SizeConstraint, SizeSpec};
pub use rust_backend::{RustBackend, supported_output_extensions};
