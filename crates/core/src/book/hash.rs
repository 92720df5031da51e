//! Content hashing for the book index cache key (spec §3, §8).
//!
//! Grounded on the teacher's `cache.rs::file_hash` (SHA-256 via the `sha2`
//! crate), but the spec's `sourceFileHash` is uppercase hex, not lowercase.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{AmsError, Result};

/// SHA-256 over the file's bytes, uppercase hex-encoded (spec §6).
pub fn file_hash(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = std::fs::File::open(path).map_err(|e| AmsError::io(path, e))?;
    std::io::copy(&mut file, &mut hasher).map_err(|e| AmsError::io(path, e))?;
    Ok(format!("{:X}", hasher.finalize()))
}

/// SHA-256 over raw bytes already in memory, uppercase hex-encoded.
pub fn bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:X}", hasher.finalize())
}
