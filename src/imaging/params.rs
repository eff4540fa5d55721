//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the decision logic in [`operations`](super::operations)
//! and the [`backend`](super::backend) that does the pixel work, so a mock
//! backend can stand in for the real one without changing any decisions.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 100). Clamped on construction.
//! - [`SizeSpec`]: Requested output size: a named percentage, a custom percentage, or a pixel cap.
//! - [`SizeConstraint`]: A [`SizeSpec`] plus an optional max-dimension override.
//! - [`Rotation`]: Clockwise rotation derived from the EXIF orientation tag.
//! - [`DecodeParams`]: Sample factor and exact target size for a scaled decode.
//! - [`EncodeParams`]: Output path, rotation, and quality for the final encode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
///
/// 100 is the default: together with [`SizeSpec::Full`] and no rotation it
/// means "leave the pixels alone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Requested output size.
///
/// Exactly one variant is active per request. Named sizes map to a fixed
/// fraction of the source; `MaxDimension` keeps full size but caps the
/// longer edge.
///
/// In TOML: `size = "medium"`, `size = { custom = 60 }`,
/// `size = { max_dimension = 2048 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeSpec {
    #[default]
    Full,
    Large,
    Medium,
    Small,
    /// Percentage of the source size, clamped to 1..=100.
    Custom(u32),
    /// Full size, longer edge capped at this many pixels.
    MaxDimension(u32),
}

impl SizeSpec {
    /// Base scale factor before any pixel cap is applied.
    pub fn base_percent(self) -> f64 {
        match self {
            SizeSpec::Full | SizeSpec::MaxDimension(_) => 1.0,
            SizeSpec::Large => 0.75,
            SizeSpec::Medium => 0.5,
            SizeSpec::Small => 0.25,
            SizeSpec::Custom(percent) => percent.clamp(1, 100) as f64 / 100.0,
        }
    }

    /// Pixel cap carried by the variant itself.
    pub fn max_dimension(self) -> Option<u32> {
        match self {
            SizeSpec::MaxDimension(px) => Some(px),
            _ => None,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Full => write!(f, "full"),
            SizeSpec::Large => write!(f, "large"),
            SizeSpec::Medium => write!(f, "medium"),
            SizeSpec::Small => write!(f, "small"),
            SizeSpec::Custom(percent) => write!(f, "{percent}%"),
            SizeSpec::MaxDimension(px) => write!(f, "max:{px}"),
        }
    }
}

/// Parses `full`, `large`, `medium`, `small`, `NN%` and `max:NNNN`.
impl FromStr for SizeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "full" => Ok(SizeSpec::Full),
            "large" => Ok(SizeSpec::Large),
            "medium" => Ok(SizeSpec::Medium),
            "small" => Ok(SizeSpec::Small),
            other => {
                if let Some(percent) = other.strip_suffix('%') {
                    match percent.parse::<u32>() {
                        Ok(p @ 1..=100) => Ok(SizeSpec::Custom(p)),
                        _ => Err(format!("invalid percentage: {other} (expected 1-100%)")),
                    }
                } else if let Some(px) = other.strip_prefix("max:") {
                    match px.parse::<u32>() {
                        Ok(px) if px > 0 => Ok(SizeSpec::MaxDimension(px)),
                        _ => Err(format!("invalid pixel cap: {other} (expected max:1 or more)")),
                    }
                } else {
                    Err(format!(
                        "unknown size '{other}' (expected full, large, medium, small, NN% or max:PX)"
                    ))
                }
            }
        }
    }
}

/// A [`SizeSpec`] with an optional max-dimension override.
///
/// The override combines with named sizes: `Medium` capped at 1024 px uses
/// whichever of the two yields the smaller result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeConstraint {
    pub spec: SizeSpec,
    pub max_dimension: Option<u32>,
}

impl SizeConstraint {
    pub fn new(spec: SizeSpec) -> Self {
        Self {
            spec,
            max_dimension: None,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Tightest pixel cap from the variant and the override.
    pub fn cap(&self) -> Option<u32> {
        match (self.spec.max_dimension(), self.max_dimension) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Full size with no cap: the request alone can never shrink the image.
    pub fn is_unconstrained(&self) -> bool {
        self.spec == SizeSpec::Full && self.cap().is_none()
    }
}

impl From<SizeSpec> for SizeConstraint {
    fn from(spec: SizeSpec) -> Self {
        Self::new(spec)
    }
}

/// Clockwise rotation needed to display an image upright.
///
/// Only the four rotational EXIF orientations are applied. Mirrored codes
/// (2, 4, 5, 7) map to [`Rotation::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Map an EXIF orientation code to the rotation that undoes it.
    pub fn from_orientation(code: Option<u32>) -> Self {
        match code {
            Some(6) => Rotation::Cw90,
            Some(3) => Rotation::Cw180,
            Some(8) => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// 90° and 270° exchange the visual axes.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }

    pub fn is_none(self) -> bool {
        self == Rotation::None
    }
}

/// Parameters for a scaled decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    pub source: PathBuf,
    /// Power-of-two reduction the decoder may apply before exact scaling.
    pub sample_size: u32,
    /// Exact pixel size of the decoded image (pre-rotation).
    pub width: u32,
    pub height: u32,
}

/// Parameters for the final rotate + encode step.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub output: PathBuf,
    pub rotation: Rotation,
    pub quality: Quality,
}
