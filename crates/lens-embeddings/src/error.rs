//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not be initialized (or was never loaded)
    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    /// Inference or decode failed for one still image
    #[error("Embedding failed: {0}")]
    EmbedFailed(String),

    /// No still image could be produced for a media item
    #[error("Frame extraction failed for {path}: {reason}")]
    FrameExtractionFailed { path: String, reason: String },

    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EmbeddingError {
    pub(crate) fn frame(path: impl Into<String>, reason: impl ToString) -> Self {
        EmbeddingError::FrameExtractionFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures scoped to a single item; the batch carries on.
    pub fn is_per_item(&self) -> bool {
        !matches!(self, EmbeddingError::ModelLoadFailed(_))
    }
}
