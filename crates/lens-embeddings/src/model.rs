//! Embedding model trait and types.
//!
//! Defines the interface for generating vector embeddings from still images.

use image::{imageops::FilterType, RgbImage};

use lens_types::EmbeddingVector;

use crate::error::EmbeddingError;

/// A single decoded still image, the unit of embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StillImage {
    pixels: RgbImage,
}

impl StillImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Decode any supported image format from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self {
            pixels: img.to_rgb8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    /// Square resize to the model's input size (no-op when already that size).
    pub fn resized(&self, size: u32) -> RgbImage {
        if self.pixels.width() == size && self.pixels.height() == size {
            self.pixels.clone()
        } else {
            image::imageops::resize(&self.pixels, size, size, FilterType::Triangle)
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "clip-vit-base-patch32")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Square input resolution in pixels
    pub input_size: u32,
}

/// Trait for image embedding models.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
/// `embed` must be deterministic for a bit-identical image.
pub trait ImageEmbedder: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate an embedding for a single still image.
    fn embed(&self, image: &StillImage) -> Result<EmbeddingVector, EmbeddingError>;

    /// Generate embeddings for several images.
    /// Default implementation calls embed() for each image.
    fn embed_batch(&self, images: &[StillImage]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        images.iter().map(|image| self.embed(image)).collect()
    }
}
