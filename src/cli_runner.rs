//! Sequences the library calls behind each subcommand and prints results.
//!
//! Results go to stdout; logs go to stderr through `tracing`.

use std::error::Error;
use std::path::Path;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{self, Commands};
use crate::compress::{self, PackStats};
use crate::extract::{self, FrameInfo, FrameReader};
use crate::index;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "DEDARC_LOG";

/// Public entry for running the CLI.
pub fn run_cli_app() -> Result<(), Box<dyn Error>> {
    let args = cli::run();
    init_logging(args.verbose);

    match args.command {
        Commands::Pack { folder, archive, level, codec_threads } => {
            if !folder.exists() {
                return Err(format!("The folder {} does not exist.", folder.display()).into());
            }
            let config = cli::codec_config(level, codec_threads)?;
            let outcome = compress::pack_directory(&folder, &archive, &config)?;
            println!("structure: {}", outcome.header);
            print_pack_summary(&archive, &outcome.stats);
        }
        Commands::Unpack { archive, outdir } => {
            if !archive.exists() {
                return Err(format!("The archive {} does not exist.", archive.display()).into());
            }
            let stats = extract::unpack_archive(&archive, &outdir)?;
            println!(
                "Unpacked to {} | Files: {} | Decompressed: {} | Copied: {} | Directories: {}",
                outdir.display(),
                stats.files,
                stats.decompressed,
                stats.copied,
                stats.directories
            );
        }
        Commands::List { archive, json } => {
            if !archive.exists() {
                return Err(format!("The archive {} does not exist.", archive.display()).into());
            }
            list_archive(&archive, json)?;
        }
    }

    Ok(())
}

/// Installs the stderr log subscriber. `DEDARC_LOG` wins over `RUST_LOG`;
/// without either, only warnings are shown unless `verbose` is set.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_pack_summary(archive: &Path, stats: &PackStats) {
    let ratio = if stats.archive_bytes > 0 {
        stats.uncompressed_bytes as f64 / stats.archive_bytes as f64
    } else {
        0.0
    };
    println!(
        "Packed {} | Files: {} ({} duplicate) | Frames: {} | Size: {:.2} → {:.2} MiB (ratio {:.2}x)",
        archive.display(),
        stats.files,
        stats.duplicate_files,
        stats.unique_frames,
        stats.uncompressed_bytes as f64 / (1024.0 * 1024.0),
        stats.archive_bytes as f64 / (1024.0 * 1024.0),
        ratio,
    );
}

#[derive(Serialize)]
struct ListReport {
    tree: serde_json::Value,
    frames: Vec<FrameInfo>,
}

fn list_archive(archive: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let mut reader = FrameReader::open(archive)?;
    let header = reader.read_header()?;
    let tree = index::parse(&header)?;
    let frames = reader.frames()?;

    if json {
        let report = ListReport { tree: index::to_document(&tree), frames };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Header ({} files):", tree.leaf_count());
    println!("{}", index::dump(&tree)?);
    println!("Frames ({}):", frames.len());
    for f in &frames {
        let ratio = if f.compressed_size > 0 {
            f.uncompressed_size as f64 / f.compressed_size as f64
        } else {
            0.0
        };
        println!(
            "- {} @ {} | {} → {} bytes ({:.2}x)",
            f.hash, f.offset, f.uncompressed_size, f.compressed_size, ratio
        );
    }
    Ok(())
}
