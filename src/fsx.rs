//! Filesystem provider.
//!
//! Thin wrappers over `std::fs` that attach the offending path to every I/O
//! error, so the pack and unpack pipelines can use `?` without repeating
//! `map_err` at each call-site.

use std::fs::File;
use std::path::Path;

use crate::error::{ArchiverError, Result};

pub fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| ArchiverError::io_at(e, path))
}

/// Creates (or truncates) a file for writing.
pub fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| ArchiverError::io_at(e, path))
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| ArchiverError::io_at(e, path))
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|e| ArchiverError::io_at(e, path))
}

/// Copies `from` over `to`, replacing any existing file. Returns bytes copied.
pub fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    std::fs::copy(from, to).map_err(|e| ArchiverError::io_at(e, to))
}

pub fn file_len(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| ArchiverError::io_at(e, path))
}
