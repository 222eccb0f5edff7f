//! Capture-date classification of single files.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use exif::{In, Tag, Value};

use crate::group::{GroupKey, SpecSourceFile};
use crate::util::file_name_lossy;

/// Textual layout of EXIF timestamps.
pub const C_CAPTURE_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Timestamp tags in lookup order.
const L_CAPTURE_TIMESTAMP_TAGS: [Tag; 3] =
    [Tag::DateTime, Tag::DateTimeOriginal, Tag::DateTimeDigitized];

/// Why a file could not be classified. Never fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read EXIF from {}: {source}", path.display())]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },
    #[error("no capture timestamp in {}", .0.display())]
    MissingTimestamp(PathBuf),
    #[error("capture timestamp {value:?} does not match `YYYY:MM:DD HH:MM:SS`")]
    InvalidTimestamp { value: String },
}

/// Source of the raw capture timestamp of a file.
pub trait MetadataSource: Send + Sync {
    fn capture_timestamp(&self, path: &Path) -> Result<String, ClassifyError>;
}

/// Reads the timestamp from embedded EXIF data (JPEG, TIFF, HEIF, PNG, WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataSource;

impl MetadataSource for ExifMetadataSource {
    fn capture_timestamp(&self, path: &Path) -> Result<String, ClassifyError> {
        let file = File::open(path).map_err(|source| ClassifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader_buf = BufReader::new(file);
        let exif_data = exif::Reader::new()
            .read_from_container(&mut reader_buf)
            .map_err(|source| ClassifyError::Exif {
                path: path.to_path_buf(),
                source,
            })?;

        for tag in L_CAPTURE_TIMESTAMP_TAGS {
            if let Some(field) = exif_data.get_field(tag, In::PRIMARY)
                && let Value::Ascii(l_values) = &field.value
                && let Some(raw_value) = l_values.first()
            {
                let c_value = String::from_utf8_lossy(raw_value);
                return Ok(c_value.trim_end_matches('\0').to_string());
            }
        }
        Err(ClassifyError::MissingTimestamp(path.to_path_buf()))
    }
}

/// Result of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumClassifyOutcome {
    Grouped(GroupKey),
    Unclassifiable { reason: String },
}

/// Parse an EXIF timestamp in the fixed `YYYY:MM:DD HH:MM:SS` layout.
pub fn parse_capture_timestamp(value: &str) -> Result<NaiveDateTime, ClassifyError> {
    NaiveDateTime::parse_from_str(value, C_CAPTURE_TIMESTAMP_FORMAT).map_err(|_| {
        ClassifyError::InvalidTimestamp {
            value: value.to_string(),
        }
    })
}

/// Text after the final `.` of the file name, case preserved; empty without one.
pub fn derive_type_tag(path: &Path) -> String {
    file_name_lossy(path)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// Classify one file. The bytes come from `path_file_read`, the type tag from
/// the original name.
pub fn classify_file(
    spec_source_file: &SpecSourceFile,
    metadata_source: &dyn MetadataSource,
) -> EnumClassifyOutcome {
    let res_key = metadata_source
        .capture_timestamp(&spec_source_file.path_file_read)
        .and_then(|c_value| parse_capture_timestamp(&c_value))
        .map(|dt_capture| {
            GroupKey::from_capture(&dt_capture, derive_type_tag(&spec_source_file.path_file_origin))
        });

    match res_key {
        Ok(group_key) => {
            tracing::debug!(
                "Classified {} as {group_key}",
                spec_source_file.path_file_origin.display()
            );
            EnumClassifyOutcome::Grouped(group_key)
        }
        Err(e) => {
            tracing::debug!(
                "Unclassifiable {}: {e}",
                spec_source_file.path_file_origin.display()
            );
            EnumClassifyOutcome::Unclassifiable {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{
        ClassifyError, EnumClassifyOutcome, ExifMetadataSource, MetadataSource, classify_file,
        derive_type_tag, parse_capture_timestamp,
    };
    use crate::group::{GroupKey, SpecSourceFile};
    use crate::testing::{TestDir, build_exif_jpeg, write_bytes, write_photo, write_text};

    #[test]
    fn derive_type_tag_takes_text_after_last_dot() {
        assert_eq!(derive_type_tag(Path::new("/a/IMG_1.JPG")), "JPG");
        assert_eq!(derive_type_tag(Path::new("/a/archive.tar.gz")), "gz");
        assert_eq!(derive_type_tag(Path::new("/a.b/README")), "");
        assert_eq!(derive_type_tag(Path::new("/a/.hidden")), "hidden");
        assert_eq!(derive_type_tag(Path::new("/a/trailing.")), "");
    }

    #[test]
    fn parse_capture_timestamp_requires_exif_layout() {
        let dt = parse_capture_timestamp("2023:05:14 10:00:00").expect("valid");
        assert_eq!(dt.to_string(), "2023-05-14 10:00:00");

        for c_bad in [
            "2023-05-14 10:00:00",
            "2023:05:14",
            "0000:00:00 00:00:00",
            "2023:13:01 00:00:00",
            "",
        ] {
            let err = parse_capture_timestamp(c_bad).expect_err("must be rejected");
            assert!(matches!(err, ClassifyError::InvalidTimestamp { .. }));
        }
    }

    #[test]
    fn exif_source_reads_datetime_tag() {
        let tmp = TestDir::new();
        let path_photo = tmp.path().join("a.jpg");
        write_bytes(&path_photo, &build_exif_jpeg("2023:05:14 10:00:00", b"pixels"));

        let c_value = ExifMetadataSource
            .capture_timestamp(&path_photo)
            .expect("timestamp");
        assert_eq!(c_value, "2023:05:14 10:00:00");
    }

    #[test]
    fn exif_source_errors_without_exif() {
        let tmp = TestDir::new();
        let path_text = tmp.path().join("b.txt");
        write_text(&path_text, "no metadata here");

        let err = ExifMetadataSource
            .capture_timestamp(&path_text)
            .expect_err("plain text has no EXIF");
        assert!(matches!(err, ClassifyError::Exif { .. }));

        let err = ExifMetadataSource
            .capture_timestamp(&tmp.path().join("missing.jpg"))
            .expect_err("missing file");
        assert!(matches!(err, ClassifyError::Io { .. }));
    }

    #[test]
    fn classify_file_groups_by_date_and_original_extension() {
        let tmp = TestDir::new();
        let path_origin = tmp.path().join("src/IMG_7.JPG");
        let path_buffered = tmp.path().join("buffer/IMG_7~1.JPG");
        write_photo(&path_origin, "2021:12:31 23:59:59");
        write_photo(&path_buffered, "2021:12:31 23:59:59");

        let spec_source_file = SpecSourceFile {
            path_file_read: path_buffered,
            path_file_origin: path_origin,
        };
        let outcome = classify_file(&spec_source_file, &ExifMetadataSource);
        assert_eq!(
            outcome,
            EnumClassifyOutcome::Grouped(GroupKey {
                year: 2021,
                month: 12,
                day: 31,
                type_tag: "JPG".to_string(),
            })
        );
    }

    #[test]
    fn classify_file_reports_bad_layout_as_unclassifiable() {
        let tmp = TestDir::new();
        let path_photo = tmp.path().join("odd.jpg");
        write_photo(&path_photo, "2023-05-14 10:00:00");

        let outcome = classify_file(&SpecSourceFile::from_source(&path_photo), &ExifMetadataSource);
        assert!(matches!(outcome, EnumClassifyOutcome::Unclassifiable { .. }));
    }
}
