//! # media-normalize
//!
//! Normalizes photos in place before they are stored or uploaded: applies
//! the EXIF orientation to the pixels, scales to a requested size, and
//! fills in metadata the capturing device left out, while every other
//! embedded tag survives the round trip.
//!
//! # Architecture
//!
//! ```text
//! MediaSession ── one operation at a time (arbiter), off-thread (tokio / rayon)
//!      │
//!      ▼
//! Normalizer ──── read tags → plan → decode/rotate/encode → splice tags → rename
//!      │
//!      ▼
//! ImageBackend ── probe / decode_scaled / rotate_and_encode
//! ```
//!
//! All sizing decisions are pure functions in [`imaging`]; the backend only
//! moves pixels. Tests swap in a recording mock backend and assert the
//! decisions without decoding anything.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Size math, backend trait + `image`-crate backend, EXIF container I/O |
//! | [`metadata`] | `MediaMetadata` parsing, GPS sexagesimal conversion, tag backfill |
//! | [`pipeline`] | `Normalizer`: one file end to end, atomic write-back, failure policy |
//! | [`arbiter`] | Single-slot guard rejecting concurrent operations |
//! | [`session`] | `MediaSession`: async, blocking and batch entry points |
//! | [`config`] | `normalize.toml` loading, validation, merging |
//! | [`types`] | Shared value types (`GeoLocation`, `DeviceInfo`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No-op Means No Write
//!
//! Full size, quality 100 and no rotation never touches the pixels, and the
//! dimension probe is skipped when no image could possibly need a change.
//! Tags are only rewritten when something was actually backfilled.
//!
//! ## Failure Is Visible
//!
//! Internal failures do not masquerade as "nothing to do":
//! [`pipeline::NormalizeStatus`] separates `Unchanged` from `Failed`, while
//! [`pipeline::NormalizeOutcome::changed`] keeps the plain boolean view.
//! Setting `propagate_internal_errors` turns failures into `Err` instead.

pub mod arbiter;
pub mod config;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
