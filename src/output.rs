//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Normalize
//!
//! One block per file, in request order, then a summary line:
//!
//! ```text
//! 001 IMG_0001.jpg: changed
//!     Source: photos/IMG_0001.jpg
//!     Size: 1500x2000
//!     Orientation: 1
//!     Captured: 2024-06-01 12:00:00
//!     Location: 48.858400, 2.294500
//!     Camera: Google Pixel 8
//! 002 IMG_0002.jpg: failed
//!     Source: photos/IMG_0002.jpg
//!     Reason: Imaging error: Decode failed: ...
//! 003 missing.jpg: error
//!     Source: photos/missing.jpg
//!     Error: Source not found or unreadable: photos/missing.jpg
//!
//! 3 files: 1 changed, 0 unchanged, 1 failed, 1 error
//! ```
//!
//! Metadata lines are only shown for fields that are present.
//!
//! ## Probe
//!
//! ```text
//! photos/IMG_0001.jpg: 4000x3000
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::Dimensions;
use crate::metadata::MediaMetadata;
use crate::pipeline::{NormalizeOutcome, NormalizeRequest, NormalizeStatus, PipelineError};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Context lines for the present metadata fields, indented one level.
pub fn format_metadata_lines(meta: &MediaMetadata) -> Vec<String> {
    let mut lines = Vec::new();

    if let (Some(w), Some(h)) = (meta.pixel_width, meta.pixel_height) {
        lines.push(format!("    Size: {}x{}", w, h));
    }
    if let Some(orientation) = meta.orientation {
        let mirrored = if meta.mirrored { " (mirrored)" } else { "" };
        lines.push(format!("    Orientation: {}{}", orientation, mirrored));
    }
    if let Some(ts) = meta.captured_at {
        lines.push(format!("    Captured: {}", ts.format("%Y-%m-%d %H:%M:%S")));
    }
    if let (Some(lat), Some(lon)) = (meta.signed_latitude(), meta.signed_longitude()) {
        lines.push(format!("    Location: {:.6}, {:.6}", lat, lon));
    }
    let camera: Vec<&str> = [meta.camera_make.as_deref(), meta.camera_model.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !camera.is_empty() {
        lines.push(format!("    Camera: {}", camera.join(" ")));
    }

    lines
}

// ============================================================================
// Normalize output
// ============================================================================

/// Format one normalization outcome.
pub fn format_outcome(index: usize, outcome: &NormalizeOutcome) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} {}: {}",
            format_index(index),
            file_label(&outcome.path),
            outcome.status.label()
        ),
        format!("    Source: {}", outcome.path.display()),
    ];
    if let NormalizeStatus::Failed { reason } = &outcome.status {
        lines.push(format!("    Reason: {}", reason));
    }
    lines.extend(format_metadata_lines(&outcome.metadata));
    lines
}

/// Format a request that produced no outcome at all.
pub fn format_error(index: usize, path: &Path, error: &PipelineError) -> Vec<String> {
    vec![
        format!("{} {}: error", format_index(index), file_label(path)),
        format!("    Source: {}", path.display()),
        format!("    Error: {}", error),
    ]
}

/// Format a whole batch, pairing each result with its request.
pub fn format_results(
    requests: &[NormalizeRequest],
    results: &[Result<NormalizeOutcome, PipelineError>],
) -> Vec<String> {
    let (mut changed, mut unchanged, mut failed, mut errors) = (0, 0, 0, 0);
    let mut lines = Vec::new();

    for (i, (request, result)) in requests.iter().zip(results).enumerate() {
        match result {
            Ok(outcome) => {
                match outcome.status {
                    NormalizeStatus::Changed => changed += 1,
                    NormalizeStatus::Unchanged => unchanged += 1,
                    NormalizeStatus::Failed { .. } => failed += 1,
                }
                lines.extend(format_outcome(i + 1, outcome));
            }
            Err(e) => {
                errors += 1;
                lines.extend(format_error(i + 1, &request.path, e));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{} files: {} changed, {} unchanged, {} failed, {} error{}",
        results.len(),
        changed,
        unchanged,
        failed,
        errors,
        if errors == 1 { "" } else { "s" }
    ));
    lines
}

/// Print batch output to stdout.
pub fn print_results(
    requests: &[NormalizeRequest],
    results: &[Result<NormalizeOutcome, PipelineError>],
) {
    for line in format_results(requests, results) {
        println!("{}", line);
    }
}

// ============================================================================
// Probe / metadata output
// ============================================================================

pub fn format_probe(path: &Path, dims: Dimensions) -> String {
    format!("{}: {}x{}", path.display(), dims.width, dims.height)
}

pub fn print_probe(path: &Path, dims: Dimensions) {
    println!("{}", format_probe(path, dims));
}

/// Pretty JSON rendering of a metadata record.
pub fn format_metadata_json(meta: &MediaMetadata) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(meta)
}

pub fn print_metadata_json(meta: &MediaMetadata) -> Result<(), serde_json::Error> {
    println!("{}", format_metadata_json(meta)?);
    Ok(())
}
