//! Block compression codec.
//!
//! A [`BlockCompressor`] and a [`BlockDecompressor`] are separate owned
//! resources wrapping their own zstd contexts; neither can be used as the
//! other. Both implement [`BlockCodec`], the "turn one block into another"
//! capability, so generic code can drive either direction.
//!
//! Every compressed block is a complete zstd frame carrying its content
//! size and a checksum, so it can be decoded and verified on its own.

use std::io;

use zstd::bulk::{Compressor, Decompressor};
use zstd::zstd_safe::{CParameter, DParameter, FrameFormat};

/// Default zstd level: a good ratio/speed balance for mixed files.
pub const DEFAULT_LEVEL: i32 = 6;
/// Default window: 8 MiB.
pub const DEFAULT_WINDOW_LOG: u32 = 23;
/// Default number of zstd worker threads per compression call.
pub const DEFAULT_WORKERS: u32 = 2;

/// Tuning for the compression side. The decompressor only needs the window bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// zstd compression level (1-22).
    pub level: i32,
    /// log2 of the match window size.
    pub window_log: u32,
    /// zstd internal worker threads. `0` compresses on the calling thread.
    pub workers: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            window_log: DEFAULT_WINDOW_LOG,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Shared capability of both codec resources.
pub trait BlockCodec {
    /// Transforms one block. `size_hint` is the exact expected output size
    /// when decompressing and is ignored when compressing.
    fn apply(&mut self, input: &[u8], size_hint: usize) -> io::Result<Vec<u8>>;
}

/// Owned zstd compression context with fixed tuning.
pub struct BlockCompressor {
    inner: Compressor<'static>,
}

impl BlockCompressor {
    pub fn new(config: &CodecConfig) -> io::Result<Self> {
        let mut inner = Compressor::new(config.level)?;
        inner.set_parameter(CParameter::WindowLog(config.window_log))?;
        inner.set_parameter(CParameter::ChecksumFlag(true))?;
        inner.set_parameter(CParameter::ContentSizeFlag(true))?;
        inner.set_parameter(CParameter::DictIdFlag(false))?;
        if config.workers > 0 {
            inner.set_parameter(CParameter::NbWorkers(config.workers))?;
        }
        Ok(Self { inner })
    }

    /// Compresses `data` into a single self-verifying zstd frame.
    pub fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        self.inner.compress(data)
    }
}

impl BlockCodec for BlockCompressor {
    fn apply(&mut self, input: &[u8], _size_hint: usize) -> io::Result<Vec<u8>> {
        self.compress(input)
    }
}

/// Owned zstd decompression context that enforces the zstd1 frame format
/// and always verifies frame checksums.
pub struct BlockDecompressor {
    inner: Decompressor<'static>,
}

impl BlockDecompressor {
    pub fn new(config: &CodecConfig) -> io::Result<Self> {
        let mut inner = Decompressor::new()?;
        inner.set_parameter(DParameter::WindowLogMax(config.window_log.max(DEFAULT_WINDOW_LOG)))?;
        inner.set_parameter(DParameter::Format(FrameFormat::One))?;
        inner.set_parameter(DParameter::ForceIgnoreChecksum(false))?;
        Ok(Self { inner })
    }

    /// Decompresses one frame whose content is exactly `expected_size` bytes.
    ///
    /// A frame that decodes to any other length is rejected, as are
    /// checksum mismatches and malformed input.
    pub fn decompress(&mut self, data: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
        let out = self.inner.decompress(data, expected_size)?;
        if out.len() != expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {} bytes, frame decoded to {}", expected_size, out.len()),
            ));
        }
        Ok(out)
    }
}

impl BlockCodec for BlockDecompressor {
    fn apply(&mut self, input: &[u8], size_hint: usize) -> io::Result<Vec<u8>> {
        self.decompress(input, size_hint)
    }
}
