//! Read-after-write integrity checks.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::report::{EnumCopyOutcome, SpecCopyRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumVerifyOutcome {
    Match,
    Mismatch { hash_src: String, hash_dst: String },
}

/// Stream a whole file through BLAKE3.
pub fn hash_file(path_file: &Path) -> io::Result<blake3::Hash> {
    let mut file = File::open(path_file)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Compare the content of a copy with its source by hash.
pub fn verify_copy(path_file_src: &Path, path_file_dst: &Path) -> io::Result<EnumVerifyOutcome> {
    let hash_src = hash_file(path_file_src)?;
    let hash_dst = hash_file(path_file_dst)?;
    if hash_src == hash_dst {
        return Ok(EnumVerifyOutcome::Match);
    }
    Ok(EnumVerifyOutcome::Mismatch {
        hash_src: hash_src.to_hex().to_string(),
        hash_dst: hash_dst.to_hex().to_string(),
    })
}

/// Verify a finished copy and turn the result into a record.
///
/// A failed read-back counts as a mismatch: the bytes were written but could
/// not be confirmed.
pub(crate) fn verify_into_record(path_file_src: &Path, path_file_dst: &Path) -> SpecCopyRecord {
    let (outcome, message) = match verify_copy(path_file_src, path_file_dst) {
        Ok(EnumVerifyOutcome::Match) => {
            tracing::debug!(
                "{} hash matches {}",
                path_file_dst.display(),
                path_file_src.display()
            );
            (EnumCopyOutcome::Verified, None)
        }
        Ok(EnumVerifyOutcome::Mismatch { hash_src, hash_dst }) => {
            let message = format!("hash mismatch: source={hash_src} copy={hash_dst}");
            tracing::warn!(
                "{} hash DOES NOT match {} ({message})",
                path_file_dst.display(),
                path_file_src.display()
            );
            (EnumCopyOutcome::Mismatched, Some(message))
        }
        Err(e) => {
            let message = format!("verification read failed: {e}");
            tracing::warn!(
                "Could not verify {} against {} ({e})",
                path_file_dst.display(),
                path_file_src.display()
            );
            (EnumCopyOutcome::Mismatched, Some(message))
        }
    };
    SpecCopyRecord {
        path_file_src: path_file_src.to_path_buf(),
        path_file_dst: path_file_dst.to_path_buf(),
        outcome,
        message,
    }
}
