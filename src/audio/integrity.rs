// Byte-level integrity check
// Confirms the whole file can be read before any decoding is attempted
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("File cannot be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Summary of a file that passed the integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub path: PathBuf,
    pub byte_len: u64,
    pub sha256: String,
}

/// Read every byte of `path`, failing if any read fails
pub fn check_integrity(path: &Path) -> Result<IntegrityReport, IntegrityError> {
    let data = fs::read(path).map_err(|source| IntegrityError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let report = IntegrityReport {
        path: path.to_path_buf(),
        byte_len: data.len() as u64,
        sha256: calculate_sha256(&data),
    };

    log::debug!(
        "Integrity check passed for {} ({} bytes, sha256 {})",
        path.display(),
        report.byte_len,
        report.sha256
    );

    Ok(report)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
