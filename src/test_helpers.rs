//! Shared test utilities for the media-normalize test suite.
//!
//! Builds small synthetic JPEGs on disk, optionally carrying EXIF tags, so
//! tests can exercise the real container and codec paths.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let path = tmp.path().join("photo.jpg");
//! create_test_jpeg_with_exif(&path, 400, 300, |exif| {
//!     exif.set(Tag::Orientation, Value::Short(vec![6]));
//! });
//! assert_eq!(read_snapshot(&path).orientation(), Some(6));
//! ```

use crate::imaging::ExifSnapshot;
use image::{ImageFormat, Rgb, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

// =========================================================================
// Fixture images
// =========================================================================

/// Write a `width`×`height` gradient JPEG without EXIF.
///
/// The gradient is asymmetric so rotations and flips are observable.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    img.save_with_format(path, ImageFormat::Jpeg).unwrap();
}

/// Write a gradient JPEG, then attach the EXIF tags set by `edit`.
pub fn create_test_jpeg_with_exif(
    path: &Path,
    width: u32,
    height: u32,
    edit: impl FnOnce(&mut ExifSnapshot),
) {
    create_test_jpeg(path, width, height);
    let mut snapshot = ExifSnapshot::default();
    edit(&mut snapshot);
    snapshot.write(path).unwrap();
}

/// Write a gradient JPEG whose APP1 segment carries `payload` verbatim,
/// valid TIFF or not.
pub fn create_test_jpeg_with_raw_exif(path: &Path, width: u32, height: u32, payload: &'static [u8]) {
    create_test_jpeg(path, width, height);
    let mut jpeg = Jpeg::from_bytes(std::fs::read(path).unwrap().into()).unwrap();
    jpeg.set_exif(Some(Bytes::from_static(payload)));
    jpeg.encoder()
        .write_to(std::fs::File::create(path).unwrap())
        .unwrap();
}

// =========================================================================
// Inspection
// =========================================================================

/// Decoded RGB bytes of an image file.
pub fn jpeg_pixels(path: &Path) -> Vec<u8> {
    image::open(path).unwrap().to_rgb8().into_raw()
}

/// EXIF snapshot of a file. Panics on unreadable files.
pub fn read_snapshot(path: &Path) -> ExifSnapshot {
    ExifSnapshot::read(path)
        .unwrap_or_else(|e| panic!("reading EXIF from {}: {e}", path.display()))
}
