//! CLI argument parsing for media-lens.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::CliOverrides;

/// media-lens
///
/// Group a local image/video collection by visual theme and find similar items.
#[derive(Parser, Debug)]
#[command(name = "media-lens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/media-lens/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override embedding cache path
    #[arg(long, global = true)]
    pub cache_path: Option<String>,

    /// Items processed in parallel while indexing
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config-affecting flags, applied after file and env layers.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            log_level: self.log_level.clone(),
            cache_path: self.cache_path.clone(),
            concurrency: self.concurrency,
        }
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate (or refresh) embeddings for every media file under a directory
    Index {
        /// Collection root
        dir: PathBuf,
    },

    /// Group a collection into visual themes
    Themes {
        /// Collection root
        dir: PathBuf,

        /// Seed for reproducible grouping (overrides clustering.seed)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the items most visually similar to one file
    Similar {
        /// Collection root
        dir: PathBuf,

        /// Target file (must be inside the collection)
        file: PathBuf,

        /// Maximum neighbours to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Embedding cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommands {
    /// Show entry count and disk usage
    Stats,

    /// Forget the cached embedding of one path
    Delete {
        /// Media path as it was indexed
        path: String,
    },

    /// Remove every cached embedding
    Clear,
}
