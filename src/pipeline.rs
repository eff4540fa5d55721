//! The normalization pipeline: one file in, the same file out.
//!
//! ```text
//! read EXIF ─► rotation from orientation ─► probe ─► plan
//!                                                    │
//!                  ┌──────── no plan ────────────────┤
//!                  ▼                                 ▼
//!        backfill + save tags          decode_scaled ─► rotate_and_encode
//!        (only if something was        into a staging file, splice tags,
//!         backfilled)                  rename over the source
//!                  │                                 │
//!                  └──────► re-read tags ◄───────────┘
//! ```
//!
//! ## Write-back
//!
//! The source is replaced atomically or not at all. Re-encoded pixels go to
//! a hidden staging file in the same directory (same filesystem, so the
//! final rename is atomic), the updated tags are spliced into it, and only
//! then is it renamed over the source. A failure at any step drops the
//! staging file and leaves the source untouched.
//!
//! ## Failures
//!
//! A missing source is always an `Err`. Everything after that (probe,
//! decode, encode, EXIF I/O) is internal: by default it is reported as
//! [`NormalizeStatus::Failed`] with metadata read from the untouched source.
//! [`NormalizeOptions::propagate_internal_errors`] turns those into `Err`.

use crate::imaging::exif_io::{persist_over, staging_file};
use crate::imaging::{
    BackendError, Dimensions, ExifSnapshot, ImageBackend, MetadataError, NormalizePlan, Quality,
    Rotation, SizeConstraint, execute_plan, may_transform, plan_normalization,
};
use crate::metadata::{Backfill, MediaMetadata, backfill_missing};
use crate::types::{DeviceInfo, GeoLocation};
use chrono::NaiveDateTime;
use exif::{Tag, Value};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source not found or unreadable: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Imaging error: {0}")]
    Imaging(#[from] BackendError),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("Staging file error: {0}")]
    Staging(std::io::Error),
    #[error("Another normalization is already in progress")]
    OperationInProgress,
    #[error("Already in this batch: {}", .0.display())]
    DuplicatePath(PathBuf),
    #[error("Worker failed: {0}")]
    Worker(String),
}

/// What to do with one file.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeRequest {
    pub path: PathBuf,
    pub size: SizeConstraint,
    pub quality: Quality,
    /// Physically apply the EXIF orientation.
    pub rotate: bool,
    /// Written as GPS tags when the file has no usable position.
    pub location: Option<GeoLocation>,
}

impl NormalizeRequest {
    /// Full size, quality 100, rotation on, no location.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: SizeConstraint::default(),
            quality: Quality::default(),
            rotate: true,
            location: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<SizeConstraint>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_location(mut self, location: Option<GeoLocation>) -> Self {
        self.location = location;
        self
    }
}

/// Per-normalizer settings that do not vary between requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOptions {
    pub propagate_internal_errors: bool,
    /// Largest edge the decoder may produce; folded into the size cap.
    pub max_texture_size: Option<u32>,
    /// Fallback camera make/model.
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NormalizeStatus {
    /// Pixels were re-encoded.
    Changed,
    /// Pixels untouched (tags may have been backfilled).
    Unchanged,
    /// An internal step failed; the source is untouched.
    Failed { reason: String },
}

impl NormalizeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NormalizeStatus::Changed => "changed",
            NormalizeStatus::Unchanged => "unchanged",
            NormalizeStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizeOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: NormalizeStatus,
    /// Parsed from the file as it is on disk after the run.
    pub metadata: MediaMetadata,
}

impl NormalizeOutcome {
    /// True only when the pixels were re-encoded.
    pub fn changed(&self) -> bool {
        self.status == NormalizeStatus::Changed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, NormalizeStatus::Failed { .. })
    }
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Runs normalization requests against one backend.
pub struct Normalizer<B: ImageBackend> {
    backend: B,
    options: NormalizeOptions,
    clock: fn() -> NaiveDateTime,
}

impl<B: ImageBackend> Normalizer<B> {
    pub fn new(backend: B, options: NormalizeOptions) -> Self {
        Self {
            backend,
            options,
            clock: local_now,
        }
    }

    /// Replace the wall clock used for missing capture timestamps.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Normalize one file in place.
    pub fn normalize(&self, request: &NormalizeRequest) -> Result<NormalizeOutcome, PipelineError> {
        let span = info_span!("normalize", path = %request.path.display());
        let _enter = span.enter();

        if !is_readable_file(&request.path) {
            return Err(PipelineError::SourceNotFound(request.path.clone()));
        }

        match self.run(request) {
            Ok((status, metadata)) => {
                info!("{}", status.label());
                Ok(NormalizeOutcome {
                    path: request.path.clone(),
                    status,
                    metadata,
                })
            }
            Err(e) if self.options.propagate_internal_errors => Err(e),
            Err(e) => {
                warn!("normalization failed, source left untouched: {e}");
                Ok(NormalizeOutcome {
                    path: request.path.clone(),
                    status: NormalizeStatus::Failed {
                        reason: e.to_string(),
                    },
                    metadata: read_metadata_lossy(&request.path),
                })
            }
        }
    }

    fn run(
        &self,
        request: &NormalizeRequest,
    ) -> Result<(NormalizeStatus, MediaMetadata), PipelineError> {
        let path = request.path.as_path();
        let mut snapshot = read_tags(path)?;

        let rotation = if request.rotate {
            Rotation::from_orientation(snapshot.orientation())
        } else {
            Rotation::None
        };
        let plan = self.plan(request, rotation)?;

        let filled = backfill_missing(
            &mut snapshot,
            &Backfill {
                now: (self.clock)(),
                location: request.location,
                device: self.options.device.as_ref(),
            },
        );
        if !filled.is_empty() {
            debug!("backfilled {} tags", filled.len());
        }

        let status = match plan {
            Some(plan) => {
                self.rewrite(path, &plan, &mut snapshot)?;
                NormalizeStatus::Changed
            }
            None => {
                if !filled.is_empty() {
                    snapshot.write(path)?;
                }
                NormalizeStatus::Unchanged
            }
        };

        let metadata = MediaMetadata::from_snapshot(&read_tags(path)?);
        Ok((status, metadata))
    }

    fn plan(
        &self,
        request: &NormalizeRequest,
        rotation: Rotation,
    ) -> Result<Option<NormalizePlan>, PipelineError> {
        let texture_limit = self.options.max_texture_size;
        if !may_transform(&request.size, texture_limit, rotation, request.quality) {
            debug!("nothing to change, skipping probe");
            return Ok(None);
        }

        let source = self.backend.probe(&request.path)?;
        Ok(plan_normalization(
            source,
            &request.size,
            texture_limit,
            rotation,
            request.quality,
        ))
    }

    /// Re-encode into a staging file, splice tags in, rename over `path`.
    fn rewrite(
        &self,
        path: &Path,
        plan: &NormalizePlan,
        snapshot: &mut ExifSnapshot,
    ) -> Result<Dimensions, PipelineError> {
        let staged = staging_file(path).map_err(PipelineError::Staging)?;
        let written = execute_plan(&self.backend, path, staged.path(), plan)?;

        snapshot.set(Tag::PixelXDimension, Value::Long(vec![written.width]));
        snapshot.set(Tag::PixelYDimension, Value::Long(vec![written.height]));
        if !plan.rotation.is_none() {
            snapshot.set(Tag::Orientation, Value::Short(vec![1]));
        }

        snapshot.write(staged.path())?;
        persist_over(staged, path).map_err(PipelineError::Staging)?;
        Ok(written)
    }
}

fn is_readable_file(path: &Path) -> bool {
    std::fs::File::open(path)
        .and_then(|f| f.metadata())
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Read the EXIF block, treating an unparsable one as absent.
///
/// Container and I/O errors still fail: without a readable container the
/// tags could not be written back either.
fn read_tags(path: &Path) -> Result<ExifSnapshot, MetadataError> {
    match ExifSnapshot::read(path) {
        Err(MetadataError::Exif(e)) => {
            warn!("unreadable EXIF block, continuing without tags: {e}");
            Ok(ExifSnapshot::default())
        }
        other => other,
    }
}

fn read_metadata_lossy(path: &Path) -> MediaMetadata {
    match ExifSnapshot::read(path) {
        Ok(snapshot) => MediaMetadata::from_snapshot(&snapshot),
        Err(e) => {
            debug!("no readable metadata: {e}");
            MediaMetadata::default()
        }
    }
}
