//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe | `image::image_dimensions` (header only) |
//! | Scaled decode (JPEG) | `jpeg_decoder::Decoder::scale` (IDCT at 1/2, 1/4, 1/8) |
//! | Decode (PNG, TIFF, WebP, unscaled JPEG) | `image::ImageReader` with format sniffing |
//! | Remaining sample prepass | `DynamicImage::thumbnail_exact` (box filter) |
//! | Exact resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Rotate | `DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, quality ignored) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{DecodeParams, EncodeParams, Rotation};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, trace};

/// Output formats the encoder can write back in place.
const OUTPUT_FORMATS: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
];

/// Returns the set of extensions that can be normalized in place.
pub fn supported_output_extensions() -> Vec<&'static str> {
    OUTPUT_FORMATS.iter().map(|(ext, _)| *ext).collect()
}

fn output_format(path: &Path) -> Result<ImageFormat, BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    OUTPUT_FORMATS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, fmt)| *fmt)
        .ok_or(BackendError::UnsupportedFormat(ext))
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))
}

fn is_jpeg(path: &Path) -> Result<bool, BackendError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.format() == Some(ImageFormat::Jpeg))
}

/// Decode a JPEG with the IDCT scaled down to the smallest size that still
/// covers `min_width`×`min_height`. The full-resolution buffer is never
/// allocated.
///
/// Returns the image and the factor it was reduced by, or `None` for pixel
/// formats this path does not convert.
fn decode_jpeg_reduced(
    path: &Path,
    min_width: u32,
    min_height: u32,
) -> Result<Option<(DynamicImage, u32)>, BackendError> {
    let jpeg_err = |e: jpeg_decoder::Error| BackendError::Decode(format!("{}: {}", path.display(), e));
    let missing_header = || BackendError::Decode(format!("{}: missing JPEG header", path.display()));

    let mut decoder = JpegDecoder::new(BufReader::new(File::open(path)?));
    decoder.read_info().map_err(jpeg_err)?;
    let header = decoder.info().ok_or_else(missing_header)?;
    if !matches!(
        header.pixel_format,
        PixelFormat::L8 | PixelFormat::RGB24 | PixelFormat::CMYK32
    ) {
        return Ok(None);
    }

    let to_u16 = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
    decoder
        .scale(to_u16(min_width), to_u16(min_height))
        .map_err(jpeg_err)?;
    let pixels = decoder.decode().map_err(jpeg_err)?;
    let info = decoder.info().ok_or_else(missing_header)?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));

    let image = match info.pixel_format {
        PixelFormat::L8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        PixelFormat::CMYK32 => {
            ImageBuffer::from_raw(width, height, cmyk_to_rgb(&pixels)).map(DynamicImage::ImageRgb8)
        }
        _ => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
    }
    .ok_or_else(|| BackendError::Decode(format!("{}: pixel buffer size mismatch", path.display())))?;

    let factor = (u32::from(header.width) / width.max(1)).max(1);
    trace!("IDCT decode at 1/{} to {}x{}", factor, width, height);
    Ok(Some((image, factor)))
}

fn cmyk_to_rgb(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(4)
        .flat_map(|px| {
            let k = px[3] as u32;
            [0, 1, 2].map(|i| (255 - px[i] as u32) * (255 - k) / 255)
        })
        .map(|v| v as u8)
        .collect()
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    }
}

/// Encode to `path` in the format implied by its extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let format = output_format(path)?;
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality as u8);
            rgb.write_with_encoder(encoder)
                .map_err(|e| BackendError::Encode(format!("JPEG: {}", e)))?;
        }
        _ => {
            let encoder = image::codecs::png::PngEncoder::new(&mut writer);
            img.write_with_encoder(encoder)
                .map_err(|e| BackendError::Encode(format!("PNG: {}", e)))?;
        }
    }

    std::io::Write::flush(&mut writer)?;
    Ok(())
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn probe(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| match e {
            image::ImageError::IoError(io) => BackendError::Io(io),
            other => BackendError::Decode(format!("{}: {}", path.display(), other)),
        })?;
        Ok(Dimensions { width, height })
    }

    fn decode_scaled(&self, params: &DecodeParams) -> Result<DynamicImage, BackendError> {
        let reduced = if params.sample_size > 1 && is_jpeg(&params.source)? {
            decode_jpeg_reduced(&params.source, params.width, params.height)?
        } else {
            None
        };
        let (mut img, reduced_by) = match reduced {
            Some(pair) => pair,
            None => (load_image(&params.source)?, 1),
        };

        // Whatever the decoder could not take off, a box filter does
        let remaining = params.sample_size / reduced_by;
        if remaining > 1 {
            let sampled_w = (img.width() / remaining).max(params.width);
            let sampled_h = (img.height() / remaining).max(params.height);
            trace!(
                sample_size = params.sample_size,
                "box prepass to {}x{}",
                sampled_w,
                sampled_h
            );
            img = img.thumbnail_exact(sampled_w, sampled_h);
        }

        if img.width() != params.width || img.height() != params.height {
            img = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        }

        debug!(
            "decoded {} at {}x{}",
            params.source.display(),
            img.width(),
            img.height()
        );
        Ok(img)
    }

    fn rotate_and_encode(
        &self,
        image: DynamicImage,
        params: &EncodeParams,
    ) -> Result<Dimensions, BackendError> {
        let rotated = rotate(image, params.rotation);
        let dims = Dimensions::new(rotated.width(), rotated.height());
        save_image(&rotated, &params.output, params.quality.value())?;
        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::create_test_jpeg;

    #[test]
    fn supported_extensions_cover_jpeg_and_png() {
        let exts = supported_output_extensions();
        for expected in &["jpg", "jpeg", "png"] {
            assert!(exts.contains(expected), "expected {expected}");
        }
    }

    #[test]
    fn output_format_is_case_insensitive() {
        assert_eq!(
            output_format(Path::new("/a/IMG_0001.JPG")).unwrap(),
            ImageFormat::Jpeg
        );
        assert!(matches!(
            output_format(Path::new("/a/image.heic")),
            Err(BackendError::UnsupportedFormat(ext)) if ext == "heic"
        ));
    }

    #[test]
    fn probe_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().probe(&path).unwrap();
        assert_eq!(dims, Dimensions::new(200, 150));
    }

    #[test]
    fn probe_nonexistent_file_is_io_error() {
        let result = RustBackend::new().probe(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn probe_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = RustBackend::new().probe(&path);
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_scaled_hits_exact_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 400, 300);

        let img = RustBackend::new()
            .decode_scaled(&DecodeParams {
                source: path,
                sample_size: 2,
                width: 130,
                height: 97,
            })
            .unwrap();
        assert_eq!((img.width(), img.height()), (130, 97));
    }

    #[test]
    fn jpeg_sample_four_never_holds_full_resolution() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 400, 300);

        let (img, factor) = decode_jpeg_reduced(&path, 100, 75).unwrap().unwrap();
        assert_eq!(factor, 4);
        assert_eq!((img.width(), img.height()), (100, 75));

        let exact = RustBackend::new()
            .decode_scaled(&DecodeParams {
                source: path,
                sample_size: 4,
                width: 100,
                height: 75,
            })
            .unwrap();
        assert_eq!((exact.width(), exact.height()), (100, 75));
    }

    #[test]
    fn jpeg_reduction_stops_at_one_eighth() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 640, 480);

        let (img, factor) = decode_jpeg_reduced(&path, 20, 15).unwrap().unwrap();
        assert_eq!(factor, 8);
        assert_eq!((img.width(), img.height()), (80, 60));

        // Sample 32: the rest comes off in the box prepass
        let exact = RustBackend::new()
            .decode_scaled(&DecodeParams {
                source: path,
                sample_size: 32,
                width: 20,
                height: 15,
            })
            .unwrap();
        assert_eq!((exact.width(), exact.height()), (20, 15));
    }

    #[test]
    fn png_sampled_decode_falls_back_to_full_decode() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        DynamicImage::new_rgb8(64, 48).save(&path).unwrap();
        assert!(!is_jpeg(&path).unwrap());

        let img = RustBackend::new()
            .decode_scaled(&DecodeParams {
                source: path,
                sample_size: 2,
                width: 30,
                height: 22,
            })
            .unwrap();
        assert_eq!((img.width(), img.height()), (30, 22));
    }

    #[test]
    fn cmyk_converts_to_rgb() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 255, 0, 0, 0]), vec![255, 255, 255, 0, 255, 255]);
    }

    #[test]
    fn rotate_and_encode_swaps_axes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 200, 100);

        let backend = RustBackend::new();
        let img = backend
            .decode_scaled(&DecodeParams {
                source,
                sample_size: 1,
                width: 200,
                height: 100,
            })
            .unwrap();

        let output = tmp.path().join("rotated.jpg");
        let dims = backend
            .rotate_and_encode(
                img,
                &EncodeParams {
                    output: output.clone(),
                    rotation: Rotation::Cw270,
                    quality: Quality::new(85),
                },
            )
            .unwrap();

        assert_eq!(dims, Dimensions::new(100, 200));
        assert_eq!(backend.probe(&output).unwrap(), Dimensions::new(100, 200));
    }

    #[test]
    fn encode_png_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.png");
        let img = DynamicImage::new_rgba8(40, 30);

        let dims = RustBackend::new()
            .rotate_and_encode(
                img,
                &EncodeParams {
                    output: output.clone(),
                    rotation: Rotation::Cw180,
                    quality: Quality::new(50),
                },
            )
            .unwrap();

        assert_eq!(dims, Dimensions::new(40, 30));
        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 30));
    }

    #[test]
    fn encode_unsupported_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.bmp");
        let result = RustBackend::new().rotate_and_encode(
            DynamicImage::new_rgb8(10, 10),
            &EncodeParams {
                output: output.clone(),
                rotation: Rotation::None,
                quality: Quality::new(90),
            },
        );
        assert!(matches!(result, Err(BackendError::UnsupportedFormat(_))));
        assert!(!output.exists());
    }
}
