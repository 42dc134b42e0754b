//! media-lens
//!
//! Browse a local image/video collection by visual theme and similarity.
//!
//! # Usage
//!
//! ```bash
//! media-lens index <DIR>
//! media-lens themes <DIR> [--seed N]
//! media-lens similar <DIR> <FILE> [--limit N]
//! media-lens cache stats|delete <PATH>|clear
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/media-lens/config.toml)
//! 3. Environment variables (LENS_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use lens_cli::{handle_cache, handle_index, handle_similar, handle_themes, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Index { dir } => {
            handle_index(&overrides, &dir).await?;
        }
        Commands::Themes { dir, seed } => {
            handle_themes(&overrides, &dir, seed).await?;
        }
        Commands::Similar { dir, file, limit } => {
            handle_similar(&overrides, &dir, &file, limit).await?;
        }
        Commands::Cache { command } => {
            handle_cache(&overrides, command)?;
        }
    }

    Ok(())
}
