//! EXIF container I/O.
//!
//! An [`ExifSnapshot`] is the primary-IFD tag set of one file, detached from
//! the file so it can be edited and written back.
//!
//! ## Container support
//!
//! | Container | EXIF location | Read | Write |
//! |---|---|---|---|
//! | JPEG | APP1 `Exif\0\0` segment | yes | yes |
//! | PNG | `eXIf` chunk | yes | yes |
//! | WebP | `EXIF` chunk | yes | yes |
//!
//! `img-parts` moves the raw TIFF payload in and out of the container;
//! `kamadak-exif` parses it ([`exif::Reader::read_raw`]) and serializes it
//! ([`exif::experimental::Writer`]). Pixel data is never touched.
//!
//! ## What survives a round trip
//!
//! Every primary-IFD field (IFD0, Exif, GPS, Interop) with a known value
//! type. IFD-pointer and thumbnail offset tags are structural and are
//! regenerated by the writer; the embedded thumbnail (IFD1) is dropped.

use exif::experimental::Writer;
use exif::{Field, In, Reader, Tag, Value};
use img_parts::{Bytes, DynImage, ImageEXIF};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable image container: {0}")]
    Container(String),
    #[error("Image format cannot carry EXIF metadata")]
    UnsupportedFormat,
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
}

/// Tags describing the TIFF structure rather than the image.
const STRUCTURAL_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
    Tag::StripOffsets,
    Tag::StripByteCounts,
];

fn is_portable(field: &Field) -> bool {
    field.ifd_num == In::PRIMARY
        && !STRUCTURAL_TAGS.contains(&field.tag)
        && !matches!(field.value, Value::Unknown(..))
}

/// Editable copy of a file's primary EXIF tags.
#[derive(Debug, Clone, Default)]
pub struct ExifSnapshot {
    fields: Vec<Field>,
}

impl ExifSnapshot {
    /// Read the EXIF block of an image file.
    ///
    /// A supported container without EXIF yields an empty snapshot.
    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let image = parse_container(std::fs::read(path)?)?;
        match image.exif() {
            Some(raw) => {
                trace!("{}: {} bytes of EXIF", path.display(), raw.len());
                Self::from_tiff(raw.to_vec())
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse a raw TIFF-structured EXIF payload.
    pub fn from_tiff(raw: Vec<u8>) -> Result<Self, MetadataError> {
        let exif = Reader::new().read_raw(raw)?;
        let fields = exif.fields().filter(|f| is_portable(f)).cloned().collect();
        Ok(Self { fields })
    }

    /// Serialize to a raw TIFF-structured EXIF payload (big-endian).
    pub fn to_tiff(&self) -> Result<Vec<u8>, MetadataError> {
        let mut writer = Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false)?;
        Ok(buf.into_inner())
    }

    /// Replace the EXIF block of `path` with this snapshot.
    ///
    /// The new file is staged next to the original and renamed over it, so
    /// the file on disk is either fully old or fully new. An empty snapshot
    /// removes the EXIF block.
    pub fn write(&self, path: &Path) -> Result<(), MetadataError> {
        let mut image = parse_container(std::fs::read(path)?)?;
        let payload = if self.fields.is_empty() {
            None
        } else {
            Some(Bytes::from(self.to_tiff()?))
        };
        image.set_exif(payload);

        let mut staged = staging_file(path)?;
        image.encoder().write_to(staged.as_file_mut())?;
        persist_over(staged, path)?;
        trace!("{}: wrote {} EXIF fields", path.display(), self.fields.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, tag: Tag) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Present with a non-empty value.
    pub fn has(&self, tag: Tag) -> bool {
        self.attribute(tag).is_some()
    }

    /// Tag value rendered as text.
    ///
    /// ASCII is returned trimmed, integers comma-separated, rationals as
    /// `num/denom` comma-separated (`"40/1,26/1,46302/1000"`). Empty values
    /// read as `None`.
    pub fn attribute(&self, tag: Tag) -> Option<String> {
        self.get(tag).and_then(render_field)
    }

    /// First integer of a BYTE/SHORT/LONG tag.
    pub fn attribute_uint(&self, tag: Tag) -> Option<u32> {
        self.get(tag).and_then(|f| f.value.get_uint(0))
    }

    /// All tags rendered as text, keyed by tag name.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|f| render_field(f).map(|v| (f.tag.to_string(), v)))
            .collect()
    }

    pub fn orientation(&self) -> Option<u32> {
        self.attribute_uint(Tag::Orientation)
    }

    /// Insert or replace a primary-IFD tag.
    pub fn set(&mut self, tag: Tag, value: Value) {
        match self.fields.iter_mut().find(|f| f.tag == tag) {
            Some(field) => field.value = value,
            None => self.fields.push(Field {
                tag,
                ifd_num: In::PRIMARY,
                value,
            }),
        }
    }

    pub fn set_ascii(&mut self, tag: Tag, text: &str) {
        self.set(tag, Value::Ascii(vec![text.as_bytes().to_vec()]));
    }

    pub fn remove(&mut self, tag: Tag) {
        self.fields.retain(|f| f.tag != tag);
    }
}

fn render_field(field: &Field) -> Option<String> {
    fn join<T: ToString>(values: &[T]) -> String {
        values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    let text = match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|b| String::from_utf8_lossy(b).trim_end_matches('\0').trim().to_string())
            .unwrap_or_default(),
        Value::Byte(v) => join(v),
        Value::Short(v) => join(v),
        Value::Long(v) => join(v),
        Value::SShort(v) => join(v),
        Value::SLong(v) => join(v),
        Value::Rational(v) => v
            .iter()
            .map(|r| format!("{}/{}", r.num, r.denom))
            .collect::<Vec<_>>()
            .join(","),
        Value::SRational(v) => v
            .iter()
            .map(|r| format!("{}/{}", r.num, r.denom))
            .collect::<Vec<_>>()
            .join(","),
        _ => field.display_value().to_string(),
    };

    Some(text).filter(|t| !t.is_empty())
}

fn parse_container(data: Vec<u8>) -> Result<DynImage, MetadataError> {
    DynImage::from_bytes(Bytes::from(data))
        .map_err(|e| MetadataError::Container(e.to_string()))?
        .ok_or(MetadataError::UnsupportedFormat)
}

/// Create a temp file in the same directory as `target`, keeping its
/// extension so format inference still works on the staged path.
pub(crate) fn staging_file(target: &Path) -> std::io::Result<NamedTempFile> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(".normalize-")
        .suffix(&suffix)
        .tempfile_in(dir)
}

/// Atomically replace `target` with a staged file, keeping its permissions.
pub(crate) fn persist_over(staged: NamedTempFile, target: &Path) -> std::io::Result<()> {
    if let Ok(meta) = std::fs::metadata(target) {
        std::fs::set_permissions(staged.path(), meta.permissions())?;
    }
    staged.persist(target).map_err(|e| e.error)?;
    Ok(())
}
