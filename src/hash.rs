//! 64-bit FNV-1a content fingerprinting.
//!
//! The hash of a file is computed over its *entire* contents and is the
//! deduplication key of the archive. [`hash_prefix`] exists for quick
//! "are these obviously different?" checks only; two files sharing their
//! first 64 KiB get the same prefix hash, so it must never key a frame.

use std::io::Read;
use std::path::Path;

use crate::common::ContentHash;
use crate::error::{ArchiverError, Result};
use crate::fsx;

pub const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
pub const FNV_PRIME: u64 = 1_099_511_628_211;

/// Number of leading bytes covered by [`hash_prefix`].
pub const HASH_PREFIX_SIZE: usize = 64 * 1024;

/// Incremental FNV-1a state. Feeding the same bytes in any chunking yields
/// the same result as [`hash`] over their concatenation.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u64,
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self { state: FNV_OFFSET_BASIS }
    }
}

impl Fnv1a {
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        let mut acc = self.state;
        for &b in bytes {
            acc = (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME);
        }
        self.state = acc;
    }

    pub fn digest(&self) -> ContentHash {
        ContentHash(self.state)
    }
}

impl std::hash::Hasher for Fnv1a {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}

/// Hashes a byte slice.
pub fn hash(bytes: &[u8]) -> ContentHash {
    let mut h = Fnv1a::default();
    h.update(bytes);
    h.digest()
}

/// Loads the whole file at `path` into `buf` (cleared first) and hashes it.
///
/// The buffer is handed back filled so the caller can compress the same
/// bytes without reading the file twice; reuse it across files to avoid
/// reallocating.
pub fn hash_file(path: &Path, buf: &mut Vec<u8>) -> Result<ContentHash> {
    buf.clear();
    let mut file = fsx::open(path)?;
    file.read_to_end(buf).map_err(|e| ArchiverError::io_at(e, path))?;
    Ok(hash(buf))
}

/// Hashes at most the first [`HASH_PREFIX_SIZE`] bytes of a file.
pub fn hash_prefix(path: &Path) -> Result<ContentHash> {
    let file = fsx::open(path)?;
    let mut prefix = Vec::with_capacity(HASH_PREFIX_SIZE);
    file.take(HASH_PREFIX_SIZE as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| ArchiverError::io_at(e, path))?;
    Ok(hash(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(hash(b""), ContentHash(14695981039346656037));
    }

    #[test]
    fn known_vectors() {
        // Reference values for 64-bit FNV-1a.
        assert_eq!(hash(b"a"), ContentHash(0xaf63dc4c8601ec8c));
        assert_eq!(hash(b"foobar"), ContentHash(0x85944171f73967e8));
    }

    #[test]
    fn deterministic_and_order_sensitive() {
        assert_eq!(hash(b"hello"), hash(b"hello"));
        assert_ne!(hash(b"ab"), hash(b"ba"));
    }

    #[test]
    fn chunking_does_not_change_the_result() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let whole = hash(&data);
        for split in [1usize, 7, 64, 4096, 9999] {
            let mut h = Fnv1a::default();
            for chunk in data.chunks(split) {
                h.write(chunk);
            }
            assert_eq!(h.finish(), whole.0, "split {split}");
        }
    }

    #[test]
    fn hash_file_fills_and_reuses_buffer() -> Result<()> {
        let mut f = NamedTempFile::new()?;
        f.write_all(b"hello")?;
        let mut buf = b"stale contents that must go".to_vec();
        let h = hash_file(f.path(), &mut buf)?;
        assert_eq!(buf, b"hello");
        assert_eq!(h, hash(b"hello"));
        Ok(())
    }

    #[test]
    fn prefix_hash_collides_where_full_hash_does_not() -> Result<()> {
        let shared = vec![0x5au8; HASH_PREFIX_SIZE];
        let mut a = NamedTempFile::new()?;
        a.write_all(&shared)?;
        a.write_all(b"tail-one")?;
        let mut b = NamedTempFile::new()?;
        b.write_all(&shared)?;
        b.write_all(b"tail-two")?;

        assert_eq!(hash_prefix(a.path())?, hash_prefix(b.path())?);
        let mut buf = Vec::new();
        assert_ne!(hash_file(a.path(), &mut buf)?, hash_file(b.path(), &mut buf)?);
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let missing = Path::new("/definitely/not/here.bin");
        let mut buf = Vec::new();
        for err in [hash_file(missing, &mut buf).unwrap_err(), hash_prefix(missing).unwrap_err()] {
            match err {
                ArchiverError::Io { path, .. } => assert_eq!(path, missing),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
