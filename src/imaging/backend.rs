//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the platform capability seam: the three
//! operations every backend must support are probe, decode_scaled, and
//! rotate_and_encode. Everything above it (size resolution, sample factor,
//! metadata bookkeeping) is shared.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::{DecodeParams, EncodeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Result of a probe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// `Image` is the backend's decoded pixel buffer. It is produced by
/// [`decode_scaled`](ImageBackend::decode_scaled) and moved into
/// [`rotate_and_encode`](ImageBackend::rotate_and_encode), which drops it
/// before returning, so a decoded buffer never outlives the step that
/// consumes it.
pub trait ImageBackend: Sync {
    type Image;

    /// Read pixel dimensions from the file header without decoding pixels.
    fn probe(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source, reduced by `sample_size`, then scaled to exactly
    /// `width`×`height`.
    fn decode_scaled(&self, params: &DecodeParams) -> Result<Self::Image, BackendError>;

    /// Rotate the image and encode it to `params.output`.
    ///
    /// Returns the dimensions of the written image.
    fn rotate_and_encode(
        &self,
        image: Self::Image,
        params: &EncodeParams,
    ) -> Result<Dimensions, BackendError>;
}
