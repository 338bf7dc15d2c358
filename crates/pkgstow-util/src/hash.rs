use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Prefix used for integrity strings produced by [`integrity_of_file`].
pub const INTEGRITY_PREFIX: &str = "blake3-";

/// Compute the BLAKE3 hash of a file, returning the hex-encoded digest.
///
/// Streams the file through the hasher, so large tarballs are never held in memory.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn blake3_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Integrity string for a file: `blake3-<hex digest>`.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn integrity_of_file(path: &Path) -> io::Result<String> {
    blake3_file(path).map(|hex| format!("{INTEGRITY_PREFIX}{hex}"))
}
