//! Shared helpers for the in-crate test modules.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static N_TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub(crate) fn new() -> Self {
        let n = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let n_seq = N_TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "photocopy_fs_test_{}_{n}_{n_seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create test dir");
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub(crate) fn write_bytes(path: &Path, raw: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, raw).expect("write bytes");
}

pub(crate) fn write_text(path: &Path, txt: &str) {
    write_bytes(path, txt.as_bytes());
}

/// Smallest JPEG that carries an IFD0 `DateTime` tag, followed by `payload`
/// after the end-of-image marker so that files with equal timestamps still
/// differ in content.
pub(crate) fn build_exif_jpeg(c_timestamp: &str, payload: &[u8]) -> Vec<u8> {
    let mut raw_ascii = c_timestamp.as_bytes().to_vec();
    raw_ascii.push(0);
    assert!(raw_ascii.len() > 4, "value must not fit inline");

    let mut raw_tiff = Vec::new();
    raw_tiff.extend_from_slice(b"MM\x00\x2a");
    raw_tiff.extend_from_slice(&8_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&1_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&0x0132_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&2_u16.to_be_bytes());
    raw_tiff.extend_from_slice(&(raw_ascii.len() as u32).to_be_bytes());
    raw_tiff.extend_from_slice(&26_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&0_u32.to_be_bytes());
    raw_tiff.extend_from_slice(&raw_ascii);

    let n_len_app1 = (2 + 6 + raw_tiff.len()) as u16;
    let mut raw_jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    raw_jpeg.extend_from_slice(&n_len_app1.to_be_bytes());
    raw_jpeg.extend_from_slice(b"Exif\x00\x00");
    raw_jpeg.extend_from_slice(&raw_tiff);
    raw_jpeg.extend_from_slice(&[0xFF, 0xD9]);
    raw_jpeg.extend_from_slice(payload);
    raw_jpeg
}

/// Write a JPEG with the given capture timestamp.
pub(crate) fn write_photo(path: &Path, c_timestamp: &str) {
    let payload = path.to_string_lossy().into_owned();
    write_bytes(path, &build_exif_jpeg(c_timestamp, payload.as_bytes()));
}
