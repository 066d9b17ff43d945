use std::path::PathBuf;

use crate::common::ContentHash;

/// The primary error type for all operations in the `dedarc` crate.
///
/// Every variant is fatal to the pack or unpack run that produced it.
/// Skipping duplicate content is a normal path and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ArchiverError {
    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened (empty for in-memory streams).
    #[error("I/O error on path '{}': {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The source directory could not be enumerated.
    #[error("cannot walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A source entry has a name that cannot be stored in the UTF-8 header.
    #[error("entry name is not valid UTF-8: '{}'", path.display())]
    NonUtf8Name { path: PathBuf },

    /// The zstd engine rejected a compression request.
    #[error("compression failed for '{}': {source}", path.display())]
    Compression {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// A zstd context could not be created or rejected its parameters.
    #[error("cannot set up the zstd codec: {0}")]
    CodecSetup(#[source] std::io::Error),

    /// A stored frame failed to decompress: checksum mismatch, malformed
    /// input, or a size that disagrees with the frame record.
    #[error("decompression failed for frame {hash}: {reason}")]
    Decompression { hash: ContentHash, reason: String },

    /// No trailer record terminates the stream.
    #[error("archive header not found: no trailer record at end of stream")]
    HeaderNotFound,

    /// Malformed header document, unknown frame tag, or truncated frame.
    #[error("format error: {0}")]
    Format(String),

    /// The header references a hash that no data frame carries.
    #[error("frame {hash} referenced by the header is missing from the archive")]
    FrameNotFound { hash: ContentHash },
}

impl ArchiverError {
    /// Names the pipeline stage that failed, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            ArchiverError::Io { .. } => "stream I/O",
            ArchiverError::Walk(_) | ArchiverError::NonUtf8Name { .. } => "hashing",
            ArchiverError::CodecSetup(_)
            | ArchiverError::Compression { .. }
            | ArchiverError::Decompression { .. } => "compression",
            ArchiverError::HeaderNotFound
            | ArchiverError::Format(_)
            | ArchiverError::FrameNotFound { .. } => "parsing",
        }
    }

    pub(crate) fn io_at(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ArchiverError::Io { source, path: path.into() }
    }
}

// Generic IO error conversion that doesn't require a path
impl From<std::io::Error> for ArchiverError {
    fn from(err: std::io::Error) -> Self {
        ArchiverError::Io { source: err, path: PathBuf::new() }
    }
}

pub type Result<T> = std::result::Result<T, ArchiverError>;
