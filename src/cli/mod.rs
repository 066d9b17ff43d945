use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::codec::{CodecConfig, DEFAULT_WORKERS};

/// Environment variable consulted for the compression level when `--level` is absent.
pub const LEVEL_ENV: &str = "DEDARC_LEVEL";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log debug details to stderr (overridden by DEDARC_LOG / RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Pack a directory tree into a new archive.
    #[command(alias = "p")]
    Pack {
        /// The directory to archive.
        folder: PathBuf,

        /// The path of the archive to create (overwritten if it exists).
        archive: PathBuf,

        /// Zstandard compression level (1-22). [default: 6, or DEDARC_LEVEL]
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=22))]
        level: Option<i32>,

        /// Number of zstd worker threads per file. [0 = compress on the main thread]
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        codec_threads: u32,
    },

    /// Restore an archive into a directory.
    #[command(alias = "u")]
    Unpack {
        /// The archive to read.
        archive: PathBuf,

        /// The directory to restore into. Created if missing.
        outdir: PathBuf,
    },

    /// Show an archive's header tree and stored frames without extracting.
    #[command(alias = "l")]
    List {
        /// The archive to inspect.
        archive: PathBuf,

        /// Print a machine-readable JSON report instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// Resolves the compression level.
///
/// Priority:
/// 1. `--level` command-line argument.
/// 2. `DEDARC_LEVEL` environment variable.
/// 3. The codec default.
pub fn get_level_from_opt_or_env(level_opt: Option<i32>) -> Result<i32, String> {
    if let Some(level) = level_opt {
        return Ok(level);
    }
    match std::env::var(LEVEL_ENV) {
        Ok(raw) => match raw.trim().parse::<i32>() {
            Ok(level) if (1..=22).contains(&level) => Ok(level),
            _ => Err(format!("{LEVEL_ENV} must be an integer between 1 and 22, got '{raw}'")),
        },
        Err(_) => Ok(CodecConfig::default().level),
    }
}

/// Builds the codec tuning for `pack` from its command-line options.
pub fn codec_config(level: Option<i32>, codec_threads: u32) -> Result<CodecConfig, String> {
    Ok(CodecConfig {
        level: get_level_from_opt_or_env(level)?,
        workers: codec_threads,
        ..CodecConfig::default()
    })
}

/// Parses command-line arguments using `clap`.
pub fn run() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn pack_arguments() {
        let args = Args::try_parse_from(["dedarc", "pack", "src", "out.dar", "--level", "9"]).unwrap();
        match args.command {
            Commands::Pack { folder, archive, level, codec_threads } => {
                assert_eq!(folder, PathBuf::from("src"));
                assert_eq!(archive, PathBuf::from("out.dar"));
                assert_eq!(level, Some(9));
                assert_eq!(codec_threads, DEFAULT_WORKERS);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Args::try_parse_from(["dedarc", "pack", "src", "out.dar", "--level", "40"]).is_err());
        assert!(Args::try_parse_from(["dedarc", "pack", "src"]).is_err());
    }

    #[test]
    fn explicit_level_wins() {
        assert_eq!(get_level_from_opt_or_env(Some(3)), Ok(3));
        let config = codec_config(Some(12), 0).unwrap();
        assert_eq!(config.level, 12);
        assert_eq!(config.workers, 0);
        assert_eq!(config.window_log, CodecConfig::default().window_log);
    }
}
