//! Local store for CLIP weights.
//!
//! Weights are fetched from the HuggingFace Hub on first use and read from
//! disk afterwards, so indexing works offline once a download succeeded.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default model repository on HuggingFace
pub const DEFAULT_MODEL_REPO: &str = "openai/clip-vit-base-patch32";

/// Weights file inside the repository
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Commit of the default repository that carries `model.safetensors`.
/// The default branch only has pytorch, tf and flax weights.
pub const DEFAULT_REVISION: &str = "d15b5f29721ca72dac15f8526b284be910de18be";

/// Where model weights live on disk and which repository they come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCache {
    /// Root directory holding one subdirectory per repository
    pub cache_dir: PathBuf,
    /// HuggingFace repository id
    pub repo_id: String,
    /// Git revision of the repository
    pub revision: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("media-lens")
            .join("models");
        Self::new(cache_dir, DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }

    /// Pin a repository revision (branch, tag or commit).
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// `<cache_dir>/<owner>_<name>[@<revision>]`, slashes replaced by `_`
    pub fn model_dir(&self) -> PathBuf {
        let mut name = self.repo_id.replace('/', "_");
        if self.revision != DEFAULT_REVISION {
            name.push('@');
            name.push_str(&self.revision.replace('/', "_"));
        }
        self.cache_dir.join(name)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.model_dir().join(WEIGHTS_FILE)
    }

    /// Weights are present and non-empty.
    pub fn is_cached(&self) -> bool {
        std::fs::metadata(self.weights_path())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

/// Resolved model files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub weights: PathBuf,
}

/// Return the cached weights, downloading them first if needed.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let weights = cache.weights_path();

    if cache.is_cached() {
        debug!(path = ?weights, "Using cached model weights");
    } else {
        info!(repo = %cache.repo_id, revision = %cache.revision, "Fetching model weights");
        download_weights(cache, &weights)?;
    }

    Ok(ModelPaths { weights })
}

/// Copy the weights out of the hub cache. The file only appears under its
/// final name once fully written.
fn download_weights(cache: &ModelCache, dest: &Path) -> Result<(), EmbeddingError> {
    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.repo(Repo::with_revision(
        cache.repo_id.clone(),
        RepoType::Model,
        cache.revision.clone(),
    ));

    let source = repo
        .get(WEIGHTS_FILE)
        .map_err(|e| EmbeddingError::Download(format!("{}@{}: {}", cache.repo_id, cache.revision, e)))?;

    std::fs::create_dir_all(cache.model_dir())?;
    let partial = dest.with_extension("safetensors.part");
    std::fs::copy(&source, &partial)?;
    std::fs::rename(&partial, dest)?;

    debug!(path = ?dest, "Model weights stored");
    Ok(())
}
