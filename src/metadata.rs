//! Embedded metadata: parsing the caller-facing record and backfilling gaps.
//!
//! ## Reading
//!
//! [`MediaMetadata::from_snapshot`] turns the raw EXIF tags of a file into a
//! typed record. Every field is parsed independently. A tag that is missing
//! or malformed leaves only that field as `None`; the others still parse.
//!
//! - **Capture time**: `DateTime`, falling back to `DateTimeOriginal`. Both
//!   use the EXIF text layout `yyyy:MM:dd HH:mm:ss` ([`TIMESTAMP_FORMAT`]).
//! - **Position**: `GPSLatitude`/`GPSLongitude` as three rationals
//!   (degrees, minutes, seconds). Values are unsigned, the hemisphere lives
//!   in the `*Ref` tags, which are carried through as-is.
//! - **Orientation**: the raw code. Codes 2, 4, 5 and 7 are mirrored
//!   variants; they are reported but never physically applied.
//!
//! ## Backfill
//!
//! [`backfill_missing`] fills tags a capture pipeline should have written
//! but didn't:
//!
//! ```text
//! DateTime absent          → DateTime = DateTimeOriginal = now
//! position absent/garbled  → GPSLatitude/Longitude(+Ref) from location
//! Make / Model absent      → from DeviceInfo
//! ```
//!
//! Existing values are never overwritten.

use crate::imaging::ExifSnapshot;
use crate::types::{DeviceInfo, GeoLocation};
use chrono::NaiveDateTime;
use exif::{Rational, Tag, Value};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// EXIF timestamp layout.
pub const TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// A single tag could not be parsed. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataParseError {
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("invalid rational triple '{0}'")]
    Rational(String),
}

/// Caller-facing view of a file's embedded metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaMetadata {
    pub captured_at: Option<NaiveDateTime>,
    pub orientation: Option<u32>,
    pub mirrored: bool,
    pub latitude: Option<f64>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<f64>,
    pub longitude_ref: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
}

impl MediaMetadata {
    pub fn from_snapshot(snapshot: &ExifSnapshot) -> Self {
        let orientation = snapshot.orientation();

        Self {
            captured_at: captured_at(snapshot),
            orientation,
            mirrored: is_mirrored(orientation),
            latitude: coordinate(snapshot, Tag::GPSLatitude),
            latitude_ref: snapshot.attribute(Tag::GPSLatitudeRef),
            longitude: coordinate(snapshot, Tag::GPSLongitude),
            longitude_ref: snapshot.attribute(Tag::GPSLongitudeRef),
            camera_make: snapshot.attribute(Tag::Make),
            camera_model: snapshot.attribute(Tag::Model),
            pixel_width: snapshot.attribute_uint(Tag::PixelXDimension),
            pixel_height: snapshot.attribute_uint(Tag::PixelYDimension),
        }
    }

    /// Latitude with the hemisphere applied (south is negative).
    pub fn signed_latitude(&self) -> Option<f64> {
        self.latitude
            .map(|v| apply_ref(v, self.latitude_ref.as_deref(), "S"))
    }

    /// Longitude with the hemisphere applied (west is negative).
    pub fn signed_longitude(&self) -> Option<f64> {
        self.longitude
            .map(|v| apply_ref(v, self.longitude_ref.as_deref(), "W"))
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

fn apply_ref(value: f64, reference: Option<&str>, negative: &str) -> f64 {
    match reference {
        Some(r) if r.eq_ignore_ascii_case(negative) => -value,
        _ => value,
    }
}

fn captured_at(snapshot: &ExifSnapshot) -> Option<NaiveDateTime> {
    [Tag::DateTime, Tag::DateTimeOriginal]
        .into_iter()
        .filter_map(|tag| snapshot.attribute(tag))
        .find_map(|text| match parse_capture_timestamp(&text) {
            Ok(ts) => Some(ts),
            Err(e) => {
                debug!("{e}");
                None
            }
        })
}

fn coordinate(snapshot: &ExifSnapshot, tag: Tag) -> Option<f64> {
    let text = snapshot.attribute(tag)?;
    parse_sexagesimal(&text)
        .map_err(|e| debug!("{tag}: {e}"))
        .ok()
}

/// Orientation codes that include a mirror flip.
pub fn is_mirrored(orientation: Option<u32>) -> bool {
    matches!(orientation, Some(2 | 4 | 5 | 7))
}

pub fn parse_capture_timestamp(text: &str) -> Result<NaiveDateTime, MetadataParseError> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| MetadataParseError::Timestamp(text.to_string()))
}

/// Parse `"d/1,m/1,s/1000"` into decimal degrees.
///
/// Exactly three `num/denom` components are required and no denominator
/// may be zero.
pub fn parse_sexagesimal(text: &str) -> Result<f64, MetadataParseError> {
    let invalid = || MetadataParseError::Rational(text.to_string());

    let parts = text
        .split(',')
        .map(|part| {
            let (num, denom) = part.trim().split_once('/').ok_or_else(invalid)?;
            let num: f64 = num.trim().parse().map_err(|_| invalid())?;
            let denom: f64 = denom.trim().parse().map_err(|_| invalid())?;
            if denom == 0.0 {
                return Err(invalid());
            }
            Ok(num / denom)
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match parts.as_slice() {
        [deg, min, sec] => Ok(deg + min / 60.0 + sec / 3600.0),
        _ => Err(invalid()),
    }
}

/// Encode decimal degrees as EXIF rationals `deg/1, min/1, sec*1000/1000`.
///
/// The sign is dropped; callers write the hemisphere into the ref tag.
pub fn to_sexagesimal(degrees: f64) -> Value {
    let value = degrees.abs();
    let mut deg = value.floor() as u32;
    let minutes = (value - deg as f64) * 60.0;
    let mut min = minutes.floor() as u32;
    let mut millis = ((minutes - min as f64) * 60.0 * 1000.0).round() as u32;

    // Rounding can carry into the next minute
    if millis >= 60_000 {
        millis -= 60_000;
        min += 1;
    }
    if min >= 60 {
        min -= 60;
        deg += 1;
    }

    Value::Rational(vec![
        Rational { num: deg, denom: 1 },
        Rational { num: min, denom: 1 },
        Rational {
            num: millis,
            denom: 1000,
        },
    ])
}

/// Inputs for filling in missing tags.
#[derive(Debug, Clone, Copy)]
pub struct Backfill<'a> {
    /// Local wall-clock time used for a missing capture timestamp.
    pub now: NaiveDateTime,
    pub location: Option<GeoLocation>,
    pub device: Option<&'a DeviceInfo>,
}

/// Write missing tags into `snapshot`. Returns the tags that were written.
pub fn backfill_missing(snapshot: &mut ExifSnapshot, backfill: &Backfill<'_>) -> Vec<Tag> {
    let mut written = Vec::new();

    if !snapshot.has(Tag::DateTime) {
        let stamp = backfill.now.format(TIMESTAMP_FORMAT).to_string();
        snapshot.set_ascii(Tag::DateTime, &stamp);
        snapshot.set_ascii(Tag::DateTimeOriginal, &stamp);
        written.extend([Tag::DateTime, Tag::DateTimeOriginal]);
    }

    if let Some(location) = backfill.location {
        let has_position = coordinate(snapshot, Tag::GPSLatitude).is_some()
            && coordinate(snapshot, Tag::GPSLongitude).is_some();
        if !has_position {
            snapshot.set(Tag::GPSLatitude, to_sexagesimal(location.latitude));
            snapshot.set_ascii(Tag::GPSLatitudeRef, location.latitude_ref());
            snapshot.set(Tag::GPSLongitude, to_sexagesimal(location.longitude));
            snapshot.set_ascii(Tag::GPSLongitudeRef, location.longitude_ref());
            written.extend([
                Tag::GPSLatitude,
                Tag::GPSLatitudeRef,
                Tag::GPSLongitude,
                Tag::GPSLongitudeRef,
            ]);
        }
    }

    if let Some(device) = backfill.device {
        for (tag, value) in [(Tag::Make, &device.make), (Tag::Model, &device.model)] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                if !snapshot.has(tag) {
                    snapshot.set_ascii(tag, value);
                    written.push(tag);
                }
            }
        }
    }

    written
}
