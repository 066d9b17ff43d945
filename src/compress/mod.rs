//! # Compression Pipeline
//!
//! This module drives archive creation: it walks a source directory,
//! fingerprints every regular file, stores each distinct content once
//! through the [`FrameWriter`], and finishes the archive with the header
//! tree describing where every file goes.
//!
//! The walk is depth-first and name-sorted, so packing the same tree twice
//! produces the same header.

use std::io::{self, Write};
use std::path::{Component, Path};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::archive::{FrameWriter, TRAILER_PREFIX_LEN};
use crate::codec::CodecConfig;
use crate::common::TreeNode;
use crate::error::{ArchiverError, Result};
use crate::{hash, index};

/// Counters reported by a pack run.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub files: u64,
    /// Directories below the source root.
    pub directories: u64,
    /// Data frames written, one per distinct content hash.
    pub unique_frames: u64,
    /// Files whose content was already stored.
    pub duplicate_files: u64,
    /// Sum of all file sizes, duplicates included.
    pub uncompressed_bytes: u64,
    /// Final archive size including the trailer.
    pub archive_bytes: u64,
}

/// Result of packing: the header text written to the trailer, plus counters.
#[derive(Debug, Clone)]
pub struct PackOutcome {
    pub header: String,
    pub stats: PackStats,
}

/// Packs `source` into a new archive file at `archive_path`.
///
/// If the archive lives inside `source`, it is left out of the walk.
pub fn pack_directory(source: &Path, archive_path: &Path, config: &CodecConfig) -> Result<PackOutcome> {
    ensure_directory(source)?;
    let writer = FrameWriter::create(archive_path, config)?;
    let exclude = std::fs::canonicalize(archive_path).ok();
    let (outcome, _file) = pack_into(source, writer, exclude.as_deref())?;
    info!(
        source = %source.display(),
        archive = %archive_path.display(),
        files = outcome.stats.files,
        unique = outcome.stats.unique_frames,
        bytes_in = outcome.stats.uncompressed_bytes,
        bytes_out = outcome.stats.archive_bytes,
        "pack complete"
    );
    Ok(outcome)
}

/// Packs `source` through an already opened writer and returns its stream.
///
/// `exclude` is an absolute path that must not be archived (the archive
/// itself when it is written inside the source tree).
pub fn pack_into<W: Write>(
    source: &Path,
    mut writer: FrameWriter<W>,
    exclude: Option<&Path>,
) -> Result<(PackOutcome, W)> {
    ensure_directory(source)?;
    let mut stats = PackStats::default();
    let tree = build_tree(source, &mut writer, exclude, &mut stats)?;
    let header = index::dump(&tree)?;

    stats.unique_frames = writer.frame_count() as u64;
    stats.archive_bytes = writer.position() + (TRAILER_PREFIX_LEN + header.len()) as u64;
    let stream = writer.write_header(&header)?;
    Ok((PackOutcome { header, stats }, stream))
}

/// Walks `source` and stores every regular file through `writer`, returning
/// the directory tree of content hashes.
pub fn build_tree<W: Write>(
    source: &Path,
    writer: &mut FrameWriter<W>,
    exclude: Option<&Path>,
    stats: &mut PackStats,
) -> Result<TreeNode> {
    let mut root = TreeNode::default();
    // one buffer for every file: hashing fills it, compression reads it
    let mut buf = Vec::new();

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let components = relative_components(source, path)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            root.insert(&components, TreeNode::default())?;
            stats.directories += 1;
        } else if file_type.is_file() {
            if is_excluded(path, exclude) {
                warn!(path = %path.display(), "skipping the archive being written");
                continue;
            }
            let content_hash = hash::hash_file(path, &mut buf)?;
            if !writer.add_file_if_new(path, content_hash, &buf)? {
                stats.duplicate_files += 1;
            }
            root.insert(&components, TreeNode::Leaf(content_hash))?;
            stats.files += 1;
            stats.uncompressed_bytes += buf.len() as u64;
        } else {
            warn!(path = %path.display(), "skipping entry that is neither a file nor a directory");
        }
    }
    Ok(root)
}

fn ensure_directory(source: &Path) -> Result<()> {
    let meta = std::fs::metadata(source).map_err(|e| ArchiverError::io_at(e, source))?;
    if !meta.is_dir() {
        return Err(ArchiverError::io_at(
            io::Error::new(io::ErrorKind::InvalidInput, "source is not a directory"),
            source,
        ));
    }
    Ok(())
}

/// Splits `path` (below `source`) into UTF-8 entry names.
fn relative_components(source: &Path, path: &Path) -> Result<Vec<String>> {
    let rel = path
        .strip_prefix(source)
        .map_err(|_| ArchiverError::Format(format!("'{}' is outside the source tree", path.display())))?;
    rel.components()
        .map(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .map(str::to_owned)
                .ok_or_else(|| ArchiverError::NonUtf8Name { path: path.to_path_buf() }),
            _ => Err(ArchiverError::Format(format!("unexpected path component in '{}'", path.display()))),
        })
        .collect()
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else { return false };
    if path.file_name() != exclude.file_name() {
        return false;
    }
    std::fs::canonicalize(path).map(|p| p == exclude).unwrap_or(false)
}
