//! # dedarc Core Library
//!
//! This crate packs a directory tree into a single self-describing archive
//! file and restores it. Identical file contents are stored once: every file
//! is fingerprinted with 64-bit FNV-1a and each distinct fingerprint gets one
//! zstd-compressed data frame. The directory tree itself is written last, as
//! a JSON header in a trailer record that readers locate from the end of the
//! file.
//!
//! ## Key Modules
//!
//! - [`hash`]: FNV-1a content fingerprints.
//! - [`codec`]: The zstd block compressor and decompressor.
//! - [`archive`]: The frame format and [`archive::FrameWriter`].
//! - [`extract`]: [`extract::FrameReader`] and tree restoration.
//! - [`index`]: The JSON header codec for the directory tree.
//! - [`compress`]: The pack pipeline over a source directory.
//!
//! ## Examples
//!
//! ```no_run
//! use std::path::Path;
//! use dedarc::codec::CodecConfig;
//!
//! # fn main() -> dedarc::error::Result<()> {
//! let outcome = dedarc::compress::pack_directory(
//!     Path::new("photos"),
//!     Path::new("photos.dar"),
//!     &CodecConfig::default(),
//! )?;
//! println!("{}", outcome.header);
//!
//! let stats = dedarc::extract::unpack_archive(Path::new("photos.dar"), Path::new("restored"))?;
//! assert_eq!(stats.files, outcome.stats.files);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod cli_runner;
pub mod codec;
pub mod common;
pub mod compress;
pub mod error;
pub mod extract;
pub mod hash;
pub mod index;
pub use error::ArchiverError;

// Path-aware filesystem helpers
pub mod fsx;
