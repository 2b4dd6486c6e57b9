//! Command-line interface for polyvoice
//!
//! Provides argument parsing using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::SegmentConfig;
use crate::segment::ChunkMode;

/// Speech re-voicing pipeline with background noise
#[derive(Parser, Debug)]
#[command(name = "polyvoice", version, about = "Re-speak what you say, one voice per word")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Interactive pipeline driven from the terminal
    Run {
        /// Folder of .wav/.mp3 clips to play under the spoken words
        #[arg(long, value_name = "DIR")]
        noise: Option<PathBuf>,

        /// Start continuous listening right away
        #[arg(long)]
        listen: bool,
    },

    /// Cut every recording in SOURCE into chunk files in OUTPUT
    Segment {
        /// Folder with .wav/.mp3 recordings
        source: PathBuf,

        /// Folder for the chunk files (created if missing)
        output: PathBuf,

        /// Fixed chunk length in milliseconds
        #[arg(long, value_name = "MS", conflicts_with = "random")]
        chunk_ms: Option<u64>,

        /// Random chunk lengths instead of fixed ones
        #[arg(long)]
        random: bool,

        /// Shortest random chunk in milliseconds
        #[arg(long, value_name = "MS", requires = "random")]
        min_ms: Option<u64>,

        /// Longest random chunk in milliseconds
        #[arg(long, value_name = "MS", requires = "random")]
        max_ms: Option<u64>,
    },
}

/// Resolve the segment flags against the configured defaults.
pub fn chunk_mode(
    random: bool,
    chunk_ms: Option<u64>,
    min_ms: Option<u64>,
    max_ms: Option<u64>,
    defaults: &SegmentConfig,
) -> ChunkMode {
    if random {
        ChunkMode::Random {
            min_ms: min_ms.unwrap_or(defaults.random_min_ms),
            max_ms: max_ms.unwrap_or(defaults.random_max_ms),
        }
    } else {
        ChunkMode::Fixed {
            length_ms: chunk_ms.unwrap_or(defaults.chunk_ms),
        }
    }
}
