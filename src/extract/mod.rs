//! # Extraction Module
//!
//! This module implements reading an archive back: locating the trailer
//! header, pulling individual data frames out by content hash, and
//! restoring a whole directory tree with [`unpack_archive`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::{DATA_FRAME_HEADER_LEN, DATA_TAG, TAG_LEN, TRAILER_PREFIX_LEN, TRAILER_TAG};
use crate::codec::{BlockDecompressor, CodecConfig};
use crate::common::{ContentHash, TreeNode};
use crate::error::{ArchiverError, Result};
use crate::{fsx, index};

/// Default size of each backward read when looking for the trailer.
pub const DEFAULT_SCAN_WINDOW: usize = 4096;

/// Location and sizes of one data frame, as recorded in its frame header.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Offset of the frame's tag from the start of the archive.
    pub offset: u64,
    pub hash: ContentHash,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

impl FrameInfo {
    fn payload_offset(&self) -> u64 {
        self.offset + DATA_FRAME_HEADER_LEN as u64
    }
}

enum Record {
    Data(FrameInfo),
    Trailer,
    End,
}

/// A reader for archives produced by [`crate::archive::FrameWriter`].
///
/// Owns its own stream and seeks freely in both directions: backward from
/// the end to find the header, forward from the start to find frames.
pub struct FrameReader<R> {
    reader: R,
    decompressor: BlockDecompressor,
    scan_window: usize,
}

impl FrameReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = fsx::open(path)?;
        FrameReader::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> FrameReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let decompressor =
            BlockDecompressor::new(&CodecConfig::default()).map_err(ArchiverError::CodecSetup)?;
        Ok(Self {
            reader,
            decompressor,
            scan_window: DEFAULT_SCAN_WINDOW,
        })
    }

    /// Overrides the backward scan window. Values below the tag length are raised to it.
    pub fn with_scan_window(mut self, window: usize) -> Self {
        self.scan_window = window.max(TAG_LEN);
        self
    }

    /// Returns the header text stored in the trailer.
    ///
    /// Reads the stream backward in windows that overlap by `TAG_LEN - 1`
    /// bytes, so a tag split across two windows is still seen. A tag match
    /// is only accepted if the record it starts ends exactly at end-of-stream;
    /// tag bytes that happen to occur inside compressed data or inside the
    /// header text itself are passed over.
    pub fn read_header(&mut self) -> Result<String> {
        let stream_len = self.reader.seek(SeekFrom::End(0))?;
        let mut window = vec![0u8; self.scan_window];
        let mut window_end = stream_len;

        while window_end > 0 {
            let start = window_end.saturating_sub(self.scan_window as u64);
            let len = (window_end - start) as usize;
            self.reader.seek(SeekFrom::Start(start))?;
            self.reader.read_exact(&mut window[..len])?;

            let mut search_end = len;
            while let Some(idx) = rfind(&window[..search_end], TRAILER_TAG) {
                let tag_offset = start + idx as u64;
                if let Some(header) = self.trailer_at(tag_offset, stream_len)? {
                    debug!(tag_offset, header_len = header.len(), "found trailer");
                    return Ok(header);
                }
                debug!(tag_offset, "trailer tag bytes without a trailer, continuing");
                search_end = idx + TAG_LEN - 1;
            }

            if start == 0 {
                break;
            }
            window_end = start + (TAG_LEN - 1) as u64;
        }
        Err(ArchiverError::HeaderNotFound)
    }

    /// Reads the trailer starting at `tag_offset`, if the record there ends the stream.
    fn trailer_at(&mut self, tag_offset: u64, stream_len: u64) -> Result<Option<String>> {
        let payload_start = tag_offset + TRAILER_PREFIX_LEN as u64;
        if payload_start > stream_len {
            return Ok(None);
        }
        self.reader.seek(SeekFrom::Start(tag_offset + TAG_LEN as u64))?;
        let mut len_bytes = [0u8; 8];
        self.reader.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if payload_start.checked_add(len) != Some(stream_len) {
            return Ok(None);
        }

        let mut payload = Vec::new();
        (&mut self.reader).take(len).read_to_end(&mut payload)?;
        if payload.len() as u64 != len {
            return Err(ArchiverError::Format("trailer payload is truncated".into()));
        }
        String::from_utf8(payload)
            .map(Some)
            .map_err(|e| ArchiverError::Format(format!("header is not valid UTF-8: {e}")))
    }

    /// Decompresses the frame storing `hash` and writes it to `out_path`.
    pub fn extract_file(&mut self, hash: ContentHash, out_path: &Path) -> Result<()> {
        let data = self.read_frame(hash)?;
        fsx::write_file(out_path, &data)
    }

    /// Returns the decompressed contents of the first frame storing `hash`.
    ///
    /// Frames are scanned from the start of the stream; the scan stops at
    /// the first match. Reaching the trailer without a match means the
    /// header and the frames disagree.
    pub fn read_frame(&mut self, hash: ContentHash) -> Result<Vec<u8>> {
        let info = self.find_frame(hash)?;
        let payload = self.read_payload(&info)?;
        let expected = usize::try_from(info.uncompressed_size).map_err(|_| {
            ArchiverError::Format(format!("frame {hash} is too large for this platform"))
        })?;
        self.decompressor
            .decompress(&payload, expected)
            .map_err(|e| ArchiverError::Decompression { hash, reason: e.to_string() })
    }

    /// Lists every data frame in stream order.
    pub fn frames(&mut self) -> Result<Vec<FrameInfo>> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut frames = Vec::new();
        let mut offset = 0u64;
        loop {
            match self.read_record(offset)? {
                Record::Data(info) => {
                    offset = self.skip_payload(&info)?;
                    frames.push(info);
                }
                Record::Trailer => return Ok(frames),
                Record::End => return Err(ArchiverError::Format("stream ended without a trailer".into())),
            }
        }
    }

    /// Walks frames from offset 0 until one carries `hash`. Leaves the
    /// stream positioned at that frame's payload.
    fn find_frame(&mut self, hash: ContentHash) -> Result<FrameInfo> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut offset = 0u64;
        loop {
            match self.read_record(offset)? {
                Record::Data(info) if info.hash == hash => return Ok(info),
                Record::Data(info) => offset = self.skip_payload(&info)?,
                Record::Trailer | Record::End => return Err(ArchiverError::FrameNotFound { hash }),
            }
        }
    }

    /// Parses the record starting at the current position (`offset`).
    fn read_record(&mut self, offset: u64) -> Result<Record> {
        let mut tag = [0u8; TAG_LEN];
        match read_up_to(&mut self.reader, &mut tag)? {
            0 => return Ok(Record::End),
            TAG_LEN => {}
            _ => return Err(ArchiverError::Format(format!("truncated record at offset {offset}"))),
        }
        if &tag == TRAILER_TAG {
            return Ok(Record::Trailer);
        }
        if &tag != DATA_TAG {
            return Err(ArchiverError::Format(format!(
                "unexpected tag {:?} at offset {offset}",
                String::from_utf8_lossy(&tag)
            )));
        }

        let mut fields = [0u8; DATA_FRAME_HEADER_LEN - TAG_LEN];
        self.reader.read_exact(&mut fields).map_err(|_| {
            ArchiverError::Format(format!("truncated frame header at offset {offset}"))
        })?;
        let field = |i: usize| -> [u8; 8] {
            let mut b = [0u8; 8];
            b.copy_from_slice(&fields[i * 8..i * 8 + 8]);
            b
        };
        Ok(Record::Data(FrameInfo {
            offset,
            hash: ContentHash::from_bytes(field(0)),
            uncompressed_size: u64::from_le_bytes(field(1)),
            compressed_size: u64::from_le_bytes(field(2)),
        }))
    }

    /// Seeks over a frame's payload; returns the offset of the next record.
    fn skip_payload(&mut self, info: &FrameInfo) -> Result<u64> {
        let skip = i64::try_from(info.compressed_size).map_err(|_| {
            ArchiverError::Format(format!("frame at offset {} has an impossible size", info.offset))
        })?;
        self.reader.seek(SeekFrom::Current(skip))?;
        Ok(info.payload_offset() + info.compressed_size)
    }

    fn read_payload(&mut self, info: &FrameInfo) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        (&mut self.reader).take(info.compressed_size).read_to_end(&mut payload)?;
        if payload.len() as u64 != info.compressed_size {
            return Err(ArchiverError::Format(format!(
                "frame at offset {} is truncated: expected {} payload bytes, found {}",
                info.offset,
                info.compressed_size,
                payload.len()
            )));
        }
        Ok(payload)
    }
}

/// Reads until `buf` is full or the stream ends. Returns bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Position of the last occurrence of `needle` in `haystack`.
fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Counters reported by an unpack run.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnpackStats {
    /// Directories created below the output root.
    pub directories: u64,
    pub files: u64,
    /// Files produced by decompressing a frame.
    pub decompressed: u64,
    /// Files produced by copying an already extracted file with the same hash.
    pub copied: u64,
}

/// Restores the archive at `archive_path` into `out_dir`, creating it if needed.
pub fn unpack_archive(archive_path: &Path, out_dir: &Path) -> Result<UnpackStats> {
    let mut reader = FrameReader::open(archive_path)?;
    let stats = unpack_from(&mut reader, out_dir)?;
    info!(
        archive = %archive_path.display(),
        out_dir = %out_dir.display(),
        files = stats.files,
        decompressed = stats.decompressed,
        copied = stats.copied,
        "unpack complete"
    );
    Ok(stats)
}

/// Reads the header from `reader` and restores the tree it describes.
pub fn unpack_from<R: Read + Seek>(reader: &mut FrameReader<R>, out_dir: &Path) -> Result<UnpackStats> {
    let header = reader.read_header()?;
    let tree = index::parse(&header)?;
    restore_tree(&tree, out_dir, reader)
}

/// Materializes `tree` under `out_dir`.
///
/// Each distinct hash is decompressed once; later leaves with the same hash
/// are plain copies of the first extracted file. The walk uses an explicit
/// stack and visits entries in name order.
pub fn restore_tree<R: Read + Seek>(
    tree: &TreeNode,
    out_dir: &Path,
    reader: &mut FrameReader<R>,
) -> Result<UnpackStats> {
    let root = tree
        .as_directory()
        .ok_or_else(|| ArchiverError::Format("header root must be a directory".into()))?;
    fsx::create_dir_all(out_dir)?;

    let mut stats = UnpackStats::default();
    let mut cache: HashMap<ContentHash, PathBuf> = HashMap::new();
    let mut stack: Vec<(&TreeNode, PathBuf)> =
        root.iter().rev().map(|(name, child)| (child, out_dir.join(name))).collect();

    while let Some((node, path)) = stack.pop() {
        match node {
            TreeNode::Directory(children) => {
                fsx::create_dir_all(&path)?;
                stats.directories += 1;
                for (name, child) in children.iter().rev() {
                    stack.push((child, path.join(name)));
                }
            }
            TreeNode::Leaf(hash) => {
                if let Some(first) = cache.get(hash) {
                    debug!(path = %path.display(), from = %first.display(), "copying duplicate");
                    fsx::copy_file(first, &path)?;
                    stats.copied += 1;
                } else {
                    debug!(path = %path.display(), %hash, "extracting");
                    reader.extract_file(*hash, &path)?;
                    cache.insert(*hash, path);
                    stats.decompressed += 1;
                }
                stats.files += 1;
            }
        }
    }
    Ok(stats)
}
