//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{Rotation, SizeConstraint};

/// Resolved scale for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    /// Final scale factor, always in `(0, 1]`.
    pub percent: f64,
    /// Target width before rotation.
    pub width: u32,
    /// Target height before rotation.
    pub height: u32,
}

impl ScalePlan {
    pub fn is_identity(&self) -> bool {
        self.percent == 1.0
    }
}

/// Resolve a size constraint against probed source dimensions.
///
/// The named size picks a base percent; the tightest pixel cap (from the
/// constraint and the optional decoder `texture_limit`) can only shrink it
/// further. Target dimensions are rounded and never drop below 1.
///
/// # Examples
/// ```
/// # use media_normalize::imaging::{resolve_scale, SizeConstraint, SizeSpec};
/// // Medium halves each axis
/// let plan = resolve_scale((4000, 3000), &SizeConstraint::new(SizeSpec::Medium), None);
/// assert_eq!((plan.width, plan.height), (2000, 1500));
///
/// // A 1000px cap beats Large (3000px on the long edge)
/// let capped = SizeConstraint::new(SizeSpec::Large).with_max_dimension(Some(1000));
/// let plan = resolve_scale((4000, 3000), &capped, None);
/// assert_eq!((plan.width, plan.height), (1000, 750));
/// ```
pub fn resolve_scale(
    source: (u32, u32),
    constraint: &SizeConstraint,
    texture_limit: Option<u32>,
) -> ScalePlan {
    let (src_w, src_h) = source;
    let mut percent = constraint.spec.base_percent();

    let cap = match (constraint.cap(), texture_limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    if let Some(cap) = cap.filter(|&c| c > 0) {
        let max_side = src_w.max(src_h) as f64;
        if max_side * percent > cap as f64 {
            percent = cap as f64 / max_side;
        }
    }

    ScalePlan {
        percent,
        width: scale_axis(src_w, percent),
        height: scale_axis(src_h, percent),
    }
}

fn scale_axis(value: u32, percent: f64) -> u32 {
    ((value as f64 * percent).round() as u32).max(1)
}

/// Largest power-of-two decode reduction that keeps both axes at or above
/// the target.
///
/// Doubles the factor while half the source, divided by the factor, still
/// covers the target in both dimensions. The decoded intermediate is
/// therefore never smaller than the target, so the exact resize that
/// follows only ever downsamples.
///
/// # Examples
/// ```
/// # use media_normalize::imaging::calculate_sample_size;
/// assert_eq!(calculate_sample_size((4000, 3000), (1000, 750)), 4);
/// assert_eq!(calculate_sample_size((4000, 3000), (2000, 1500)), 2);
/// assert_eq!(calculate_sample_size((4000, 3000), (4000, 3000)), 1);
/// ```
pub fn calculate_sample_size(source: (u32, u32), target: (u32, u32)) -> u32 {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = (target.0.max(1), target.1.max(1));
    let mut sample = 1;

    if src_h > tgt_h || src_w > tgt_w {
        let half_h = src_h / 2;
        let half_w = src_w / 2;
        while half_h / sample >= tgt_h && half_w / sample >= tgt_w {
            sample *= 2;
        }
    }

    sample
}

/// Dimensions after applying a rotation (90° and 270° swap the axes).
pub fn rotated_dimensions(dims: (u32, u32), rotation: Rotation) -> (u32, u32) {
    if rotation.swaps_axes() {
        (dims.1, dims.0)
    } else {
        dims
    }
}
