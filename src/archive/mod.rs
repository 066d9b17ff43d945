//! # Archive Format
//!
//! An archive is a flat sequence of frames, written front to back in one pass:
//!
//! ```text
//! +------+------+-------+-------+----------------+
//! | ZSTD | hash | usize | csize | zstd payload   |   data frame, once per distinct hash
//! +------+------+-------+-------+----------------+
//! | ...                                          |
//! +------+--------+------------------------------+
//! | HDR0 | length | header JSON (UTF-8)          |   trailer, exactly once, last
//! +------+--------+------------------------------+
//! ```
//!
//! All integers are little-endian `u64`. The trailing digit of the trailer
//! tag is the format version. There is no leading header and no index of
//! frame offsets: readers find the trailer by scanning back from the end of
//! the file (see [`crate::extract::FrameReader`]).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::codec::{BlockCompressor, CodecConfig};
use crate::common::ContentHash;
use crate::error::{ArchiverError, Result};
use crate::fsx;

/// Tag opening every data frame.
pub const DATA_TAG: &[u8; 4] = b"ZSTD";
/// Tag opening the trailer record. The last byte is the format version.
pub const TRAILER_TAG: &[u8; 4] = b"HDR0";
pub const TAG_LEN: usize = 4;
/// tag + hash + uncompressed size + compressed size
pub const DATA_FRAME_HEADER_LEN: usize = TAG_LEN + 8 + 8 + 8;
/// tag + header length
pub const TRAILER_PREFIX_LEN: usize = TAG_LEN + 8;

/// Appends deduplicated data frames, then a single trailer, to an output stream.
///
/// The writer owns its stream for its whole lifetime. [`FrameWriter::write_header`]
/// consumes the writer, so nothing can be appended after the trailer.
pub struct FrameWriter<W: Write> {
    writer: W,
    compressor: BlockCompressor,
    /// hash -> offset of the frame that stores it
    written: HashMap<ContentHash, u64>,
    position: u64,
}

impl FrameWriter<BufWriter<File>> {
    /// Creates (or truncates) the archive file at `path`.
    pub fn create(path: &Path, config: &CodecConfig) -> Result<Self> {
        let file = fsx::create(path)?;
        // 8 MiB buffer to keep small frames from turning into small writes
        FrameWriter::new(BufWriter::with_capacity(8 * 1024 * 1024, file), config)
    }
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W, config: &CodecConfig) -> Result<Self> {
        let compressor = BlockCompressor::new(config).map_err(ArchiverError::CodecSetup)?;
        Ok(Self {
            writer,
            compressor,
            written: HashMap::new(),
            position: 0,
        })
    }

    /// Stores `data` unless a frame with the same hash already exists.
    ///
    /// Returns `true` if a new frame was written. `path` is only used for
    /// diagnostics. The caller guarantees `hash` is the hash of `data`.
    pub fn add_file_if_new(&mut self, path: &Path, hash: ContentHash, data: &[u8]) -> Result<bool> {
        if self.written.contains_key(&hash) {
            debug!(path = %path.display(), %hash, "content already stored, skipping");
            return Ok(false);
        }

        let compressed = self
            .compressor
            .compress(data)
            .map_err(|source| ArchiverError::Compression { source, path: path.to_path_buf() })?;

        let offset = self.position;
        let mut frame_header = [0u8; DATA_FRAME_HEADER_LEN];
        frame_header[..4].copy_from_slice(DATA_TAG);
        frame_header[4..12].copy_from_slice(&hash.to_bytes());
        frame_header[12..20].copy_from_slice(&(data.len() as u64).to_le_bytes());
        frame_header[20..28].copy_from_slice(&(compressed.len() as u64).to_le_bytes());
        self.writer.write_all(&frame_header)?;
        self.writer.write_all(&compressed)?;
        self.position += (DATA_FRAME_HEADER_LEN + compressed.len()) as u64;

        debug!(
            path = %path.display(),
            %hash,
            offset,
            uncompressed = data.len(),
            compressed = compressed.len(),
            "stored frame"
        );
        self.written.insert(hash, offset);
        Ok(true)
    }

    /// Appends the trailer record holding `header`, flushes, and hands the
    /// stream back. This is the last write of the archive.
    pub fn write_header(mut self, header: &str) -> Result<W> {
        self.writer.write_all(TRAILER_TAG)?;
        self.writer.write_all(&(header.len() as u64).to_le_bytes())?;
        self.writer.write_all(header.as_bytes())?;
        self.writer.flush()?;
        self.position += (TRAILER_PREFIX_LEN + header.len()) as u64;
        debug!(header_len = header.len(), archive_len = self.position, "wrote trailer");
        Ok(self.writer)
    }

    pub fn contains(&self, hash: ContentHash) -> bool {
        self.written.contains_key(&hash)
    }

    /// Offset of the frame storing `hash`, if stored.
    pub fn frame_offset(&self, hash: ContentHash) -> Option<u64> {
        self.written.get(&hash).copied()
    }

    pub fn frame_count(&self) -> usize {
        self.written.len()
    }

    /// Bytes written to the stream so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}
