//! Candle-based image embedding implementation.
//!
//! Uses the CLIP ViT-B/32 vision tower for 512-dimensional embeddings.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use tracing::{debug, info};

use lens_types::EmbeddingVector;

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{ImageEmbedder, ModelInfo, StillImage};

/// Embedding dimension for CLIP ViT-B/32
pub const EMBEDDING_DIM: usize = 512;

/// Square input resolution expected by the vision tower
pub const CLIP_IMAGE_SIZE: u32 = 224;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Candle-based embedder using CLIP ViT-B/32.
pub struct ClipEmbedder {
    model: ClipModel,
    device: Device,
    info: ModelInfo,
}

impl ClipEmbedder {
    /// Load the embedding model from cache (downloading if needed).
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::load_from_path(&paths.weights)
    }

    /// Load with default cache settings
    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    /// Load from an explicit safetensors file
    pub fn load_from_path(weights_path: &Path) -> Result<Self, EmbeddingError> {
        info!("Loading embedding model...");

        // CPU only; GPU support can come later behind feature flags
        let device = Device::Cpu;

        if !weights_path.exists() {
            return Err(EmbeddingError::ModelNotFound(
                weights_path.display().to_string(),
            ));
        }

        let config = ClipConfig::vit_base_patch32();
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = ClipModel::new(vb, &config)?;

        info!(
            dim = EMBEDDING_DIM,
            input = CLIP_IMAGE_SIZE,
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            device,
            info: ModelInfo {
                name: "clip-vit-base-patch32".to_string(),
                dimension: EMBEDDING_DIM,
                input_size: CLIP_IMAGE_SIZE,
            },
        })
    }

    /// Resize, scale to [0,1] and normalize with CLIP mean/std into NCHW.
    fn preprocess(&self, images: &[StillImage]) -> Result<Tensor, EmbeddingError> {
        let size = CLIP_IMAGE_SIZE as usize;
        let mut tensors = Vec::with_capacity(images.len());

        for image in images {
            let rgb = image.resized(CLIP_IMAGE_SIZE);
            let data: Vec<f32> = rgb
                .pixels()
                .flat_map(|p| {
                    [
                        p[0] as f32 / 255.0,
                        p[1] as f32 / 255.0,
                        p[2] as f32 / 255.0,
                    ]
                })
                .collect();
            let tensor = Tensor::from_vec(data, (size, size, 3), &self.device)?.permute((2, 0, 1))?;
            tensors.push(tensor);
        }

        let batch = Tensor::stack(&tensors, 0)?;
        let mean = Tensor::new(&CLIP_MEAN, &self.device)?.reshape((1, 3, 1, 1))?;
        let std = Tensor::new(&CLIP_STD, &self.device)?.reshape((1, 3, 1, 1))?;
        Ok(batch.broadcast_sub(&mean)?.broadcast_div(&std)?)
    }
}

impl ImageEmbedder for ClipEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, image: &StillImage) -> Result<EmbeddingVector, EmbeddingError> {
        self.embed_batch(std::slice::from_ref(image))?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbedFailed("model returned no features".to_string()))
    }

    fn embed_batch(&self, images: &[StillImage]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = images.len(), "Embedding batch");

        let pixel_values = self.preprocess(images)?;
        let features = self.model.get_image_features(&pixel_values)?;
        let rows: Vec<Vec<f32>> = features.to_vec2()?;

        // EmbeddingVector::new normalizes
        let embeddings: Vec<EmbeddingVector> = rows.into_iter().map(EmbeddingVector::new).collect();

        debug!(count = embeddings.len(), dim = EMBEDDING_DIM, "Batch complete");
        Ok(embeddings)
    }
}
