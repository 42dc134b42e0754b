//! Error types shared across media-lens.

use thiserror::Error;

/// Errors raised by the shared types layer.
#[derive(Debug, Error)]
pub enum LensError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Media could not be read
    #[error("Media unreadable: {path}: {source}")]
    MediaUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Path is not a recognised image or video
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Vectors of different lengths mixed in one index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
