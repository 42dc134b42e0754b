//! Clustering error types.

use thiserror::Error;

/// Errors that can occur during similarity and clustering operations.
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// Vectors of different lengths were compared
    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The query item has no embedding
    #[error("No embedding for {0}")]
    MissingEmbedding(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
