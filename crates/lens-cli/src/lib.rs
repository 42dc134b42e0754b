//! media-lens CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (index, themes, similar, cache)
//! - `scan`: Directory scanning for media files

pub mod cli;
pub mod commands;
pub mod scan;

pub use cli::{CacheCommands, Cli, Commands};
pub use commands::{handle_cache, handle_index, handle_similar, handle_themes, CliOverrides};
pub use scan::scan_media;
