//! High-level image operations.
//!
//! These functions combine calculations with backend execution. Planning is
//! pure: [`plan_normalization`] turns probed dimensions plus a request into a
//! [`NormalizePlan`], or `None` when the pixels can stay as they are.
//! [`execute_plan`] then runs the two pixel steps on a backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    ScalePlan, calculate_sample_size, resolve_scale, rotated_dimensions,
};
use super::params::{DecodeParams, EncodeParams, Quality, Rotation, SizeConstraint};
use std::path::Path;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Whether a request could change the pixels of *some* image.
///
/// Full size, no cap, no texture limit, maximum quality and no rotation can
/// never produce a transform, so the caller may skip probing entirely.
pub fn may_transform(
    constraint: &SizeConstraint,
    texture_limit: Option<u32>,
    rotation: Rotation,
    quality: Quality,
) -> bool {
    !(constraint.is_unconstrained()
        && texture_limit.is_none()
        && quality.is_max()
        && rotation.is_none())
}

/// Everything needed to re-encode one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizePlan {
    /// Probed source dimensions.
    pub source: Dimensions,
    pub scale: ScalePlan,
    pub sample_size: u32,
    pub rotation: Rotation,
    pub quality: Quality,
    /// Dimensions of the written file (post-rotation).
    pub final_dims: Dimensions,
}

/// Plan a normalization without executing it.
///
/// Returns `None` when the resolved scale is 1.0, quality is 100 and no
/// rotation is needed: the file's pixels stay untouched.
pub fn plan_normalization(
    source: Dimensions,
    constraint: &SizeConstraint,
    texture_limit: Option<u32>,
    rotation: Rotation,
    quality: Quality,
) -> Option<NormalizePlan> {
    let scale = resolve_scale(source.as_tuple(), constraint, texture_limit);

    if scale.is_identity() && quality.is_max() && rotation.is_none() {
        return None;
    }

    let sample_size = calculate_sample_size(source.as_tuple(), (scale.width, scale.height));
    let final_dims = rotated_dimensions((scale.width, scale.height), rotation).into();

    Some(NormalizePlan {
        source,
        scale,
        sample_size,
        rotation,
        quality,
        final_dims,
    })
}

/// Decode `source_path` per the plan and encode the result to `output_path`.
///
/// `output_path` is usually a staging file; the caller moves it into place.
pub fn execute_plan<B: ImageBackend>(
    backend: &B,
    source_path: &Path,
    output_path: &Path,
    plan: &NormalizePlan,
) -> Result<Dimensions> {
    debug!(
        "{}: {}x{} → {}x{} (sample {}, rotate {}°, quality {})",
        source_path.display(),
        plan.source.width,
        plan.source.height,
        plan.final_dims.width,
        plan.final_dims.height,
        plan.sample_size,
        plan.rotation.degrees(),
        plan.quality.value()
    );

    let image = backend.decode_scaled(&DecodeParams {
        source: source_path.to_path_buf(),
        sample_size: plan.sample_size,
        width: plan.scale.width,
        height: plan.scale.height,
    })?;

    backend.rotate_and_encode(
        image,
        &EncodeParams {
            output: output_path.to_path_buf(),
            rotation: plan.rotation,
            quality: plan.quality,
        },
    )
}
