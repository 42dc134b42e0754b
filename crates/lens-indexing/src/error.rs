//! Error types for batch indexing.

use thiserror::Error;

/// Errors raised while setting up an indexing run.
///
/// Per-item failures are not errors of the run; they reach the caller
/// through the item-error callback instead.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Invalid indexing settings
    #[error("Invalid indexing config: {0}")]
    Config(String),
}
