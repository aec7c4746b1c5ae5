//! Post-download integrity check.
use crate::error::{DownloadError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Calculates the SHA-256 hash of a file and compares it to an expected hash.
///
/// # Arguments
///
/// * `path` - The path to the file on disk.
/// * `expected_hash` - The hex-encoded SHA-256 string to compare against.
///
/// # Errors
///
/// Returns [`DownloadError::IntegrityMismatch`] if the hashes differ, or an
/// I/O error if the file cannot be read.
pub fn verify_file_integrity(path: &Path, expected_hash: &str) -> Result<()> {
    tracing::info!(path = %path.display(), "verifying file integrity");

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    let actual = hex::encode(hasher.finalize());
    let expected = expected_hash.trim().to_lowercase();

    if actual == expected {
        Ok(())
    } else {
        Err(DownloadError::IntegrityMismatch { expected, actual })
    }
}
