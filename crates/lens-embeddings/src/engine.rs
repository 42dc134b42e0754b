//! Embedding engine with a single shared model-load gate.
//!
//! The model is loaded lazily and at most once. Callers arriving while a
//! load is in flight wait on that same load. A failed load leaves the gate
//! empty so a later call can retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use lens_types::EmbeddingVector;

use crate::cache::ModelCache;
use crate::clip::ClipEmbedder;
use crate::error::EmbeddingError;
use crate::model::{ImageEmbedder, ModelInfo, StillImage};

/// Produces a ready-to-use embedder. Called from a blocking thread.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn ImageEmbedder>, EmbeddingError>;
}

impl<F> ModelLoader for F
where
    F: Fn() -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
        self()
    }
}

/// Loads the CLIP vision model from the local model cache.
#[derive(Debug, Clone, Default)]
pub struct ClipLoader {
    cache: ModelCache,
}

impl ClipLoader {
    pub fn new(cache: ModelCache) -> Self {
        Self { cache }
    }
}

impl ModelLoader for ClipLoader {
    fn load(&self) -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
        let embedder = ClipEmbedder::load(&self.cache)?;
        Ok(Arc::new(embedder))
    }
}

static SHARED_ENGINE: OnceLock<Arc<EmbeddingEngine>> = OnceLock::new();

/// Wraps a lazily-loaded embedding model.
pub struct EmbeddingEngine {
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn ImageEmbedder>>,
    load_attempts: AtomicU64,
}

impl EmbeddingEngine {
    /// Create an engine that will load its model with `loader` on first use.
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            model: OnceCell::new(),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Create an engine around an already-loaded model.
    pub fn with_model(model: Arc<dyn ImageEmbedder>) -> Self {
        let preloaded = Arc::clone(&model);
        Self {
            loader: Arc::new(move || -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
                Ok(Arc::clone(&preloaded))
            }),
            model: OnceCell::new_with(Some(model)),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// The process-wide engine backed by the CLIP loader.
    ///
    /// Only the first call's `cache` takes effect; later calls get the same engine.
    pub fn shared(cache: ModelCache) -> Arc<Self> {
        Arc::clone(SHARED_ENGINE.get_or_init(|| Arc::new(Self::new(ClipLoader::new(cache)))))
    }

    /// Load the model unless it is already loaded.
    ///
    /// Concurrent callers share one in-flight load. On failure the error is
    /// returned and the gate stays empty.
    pub async fn ensure_loaded(&self) -> Result<(), EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(attempt, "Starting model load");

                let loader = Arc::clone(&self.loader);
                let loaded = match tokio::task::spawn_blocking(move || loader.load()).await {
                    Ok(result) => result,
                    Err(e) => Err(EmbeddingError::ModelLoadFailed(format!("loader task: {}", e))),
                };

                match loaded {
                    Ok(model) => {
                        info!(
                            model = %model.info().name,
                            dim = model.info().dimension,
                            "Embedding model ready"
                        );
                        Ok(model)
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Embedding model failed to load");
                        Err(match e {
                            EmbeddingError::ModelLoadFailed(_) => e,
                            other => EmbeddingError::ModelLoadFailed(other.to_string()),
                        })
                    }
                }
            })
            .await
            .map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Info of the loaded model, if any.
    pub fn info(&self) -> Option<ModelInfo> {
        self.model.get().map(|m| m.info().clone())
    }

    /// Number of load attempts started so far.
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::SeqCst)
    }

    /// Embed one still image on a blocking thread.
    ///
    /// Fails with `ModelLoadFailed` if `ensure_loaded` never succeeded and
    /// with `EmbedFailed` for anything that goes wrong with this image.
    pub async fn embed(&self, image: StillImage) -> Result<EmbeddingVector, EmbeddingError> {
        let model = self
            .model
            .get()
            .cloned()
            .ok_or_else(|| EmbeddingError::ModelLoadFailed("model not loaded".to_string()))?;
        let expected = model.info().dimension;

        let vector = tokio::task::spawn_blocking(move || model.embed(&image))
            .await
            .map_err(|e| EmbeddingError::EmbedFailed(format!("inference task: {}", e)))?
            .map_err(|e| match e {
                EmbeddingError::EmbedFailed(_) => e,
                other => EmbeddingError::EmbedFailed(other.to_string()),
            })?;

        if vector.dimension() != expected {
            return Err(EmbeddingError::EmbedFailed(format!(
                "model produced {} dimensions, expected {}",
                vector.dimension(),
                expected
            )));
        }
        Ok(vector)
    }
}
