//! Cache-first batch embedding generation.
//!
//! For each item the cache is consulted first; only missing or stale items
//! go through frame extraction and the model. Results are consumed in input
//! order, so progress reports are deterministic even with `concurrency > 1`.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lens_embeddings::{EmbeddingEngine, EmbeddingError, FrameExtractor};
use lens_storage::EmbeddingCache;
use lens_types::{CacheEntry, EmbeddingVector, IndexingConfig, MediaItem, SessionEmbeddingIndex};

use crate::error::IndexingError;
use crate::progress::{IndexingProgress, ItemErrorCallback, ProgressCallback};

/// Availability of AI features after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiStatus {
    /// At least one item has an embedding (or there was nothing to index).
    Available,
    /// The model is usable but no item produced an embedding.
    Degraded,
    /// The model could not be loaded.
    Disabled(String),
}

impl AiStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, AiStatus::Available)
    }
}

/// Result of one indexing run.
#[derive(Debug)]
pub struct IndexingOutcome {
    /// Embeddings of every item that succeeded.
    pub index: SessionEmbeddingIndex,
    /// Final counters.
    pub progress: IndexingProgress,
    pub ai_status: AiStatus,
    /// True when the run stopped early on the cancel signal.
    pub cancelled: bool,
    /// Time taken in milliseconds.
    pub elapsed_ms: u64,
}

/// What happened to a single item.
enum ItemOutcome {
    Cached(EmbeddingVector),
    Generated(EmbeddingVector),
    Failed(EmbeddingError),
    ModelUnavailable,
    Skipped,
}

/// Run-scoped model gate. Holds the result of the first load attempt so a
/// failed model is reported once per run instead of once per item.
type ModelGate = OnceCell<Result<(), String>>;

/// Orchestrates embedding generation across a collection.
pub struct BatchIndexer {
    cache: Arc<dyn EmbeddingCache>,
    extractor: Arc<dyn FrameExtractor>,
    engine: Arc<EmbeddingEngine>,
    config: IndexingConfig,
}

impl BatchIndexer {
    pub fn new(
        cache: Arc<dyn EmbeddingCache>,
        extractor: Arc<dyn FrameExtractor>,
        engine: Arc<EmbeddingEngine>,
        config: IndexingConfig,
    ) -> Result<Self, IndexingError> {
        config.validate().map_err(IndexingError::Config)?;
        Ok(Self {
            cache,
            extractor,
            engine,
            config,
        })
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Index `items` and return the session embedding index.
    ///
    /// `on_progress` is called after every item with a strictly increasing
    /// `processed` count. `on_item_error` is called once per item that failed
    /// extraction or embedding. `cancel` is checked before each item starts.
    pub async fn run(
        &self,
        items: &[MediaItem],
        on_progress: &dyn ProgressCallback,
        on_item_error: &dyn ItemErrorCallback,
        cancel: &CancellationToken,
    ) -> IndexingOutcome {
        let start = Instant::now();
        info!(
            total = items.len(),
            concurrency = self.config.concurrency,
            durable_cache = self.cache.is_durable(),
            "Starting indexing run"
        );

        let model_gate = ModelGate::new();
        let gate = &model_gate;
        let mut index = SessionEmbeddingIndex::new();
        let mut progress = IndexingProgress::new(items.len());
        let mut cancelled = false;
        let mut cache_hits = 0usize;

        let results = stream::iter(items.iter())
            .map(|item| async move {
                let outcome = self.process_item(item, gate, cancel).await;
                (item, outcome)
            })
            .buffered(self.config.concurrency);
        let mut results = std::pin::pin!(results);

        while let Some((item, outcome)) = results.next().await {
            let vector = match outcome {
                ItemOutcome::Skipped => {
                    cancelled = true;
                    break;
                }
                ItemOutcome::Cached(vector) => {
                    cache_hits += 1;
                    Some(vector)
                }
                ItemOutcome::Generated(vector) => Some(vector),
                ItemOutcome::Failed(e) => {
                    on_item_error.on_item_error(item, &e);
                    None
                }
                ItemOutcome::ModelUnavailable => None,
            };

            match vector.map(|v| index.insert(item.path.clone(), v)) {
                Some(Ok(_)) => progress.record_success(),
                Some(Err(e)) => {
                    let e = EmbeddingError::EmbedFailed(e.to_string());
                    on_item_error.on_item_error(item, &e);
                    progress.record_failure();
                }
                None => progress.record_failure(),
            }
            on_progress.on_progress(&progress);
        }

        let ai_status = match gate.get() {
            Some(Err(reason)) => AiStatus::Disabled(reason.clone()),
            _ if progress.total > 0 && index.is_empty() && !cancelled => AiStatus::Degraded,
            _ => AiStatus::Available,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &ai_status {
            AiStatus::Disabled(reason) => {
                error!(reason = %reason, "AI features disabled for this session")
            }
            AiStatus::Degraded => warn!(
                total = progress.total,
                "No item produced an embedding; similarity features unavailable"
            ),
            AiStatus::Available => {}
        }
        info!(
            processed = progress.processed,
            succeeded = progress.succeeded,
            failed = progress.failed,
            cache_hits,
            cancelled,
            elapsed_ms,
            "Indexing run complete"
        );

        IndexingOutcome {
            index,
            progress,
            ai_status,
            cancelled,
            elapsed_ms,
        }
    }

    async fn process_item(
        &self,
        item: &MediaItem,
        gate: &ModelGate,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return ItemOutcome::Skipped;
        }

        if let Some(vector) = self.cached_vector(item) {
            debug!(path = %item.path, "Cache hit");
            return ItemOutcome::Cached(vector);
        }

        // Load on first miss only: a fully cached collection never touches the model
        let loaded = gate
            .get_or_init(|| async {
                self.engine
                    .ensure_loaded()
                    .await
                    .map_err(|e| e.to_string())
            })
            .await;
        if loaded.is_err() {
            return ItemOutcome::ModelUnavailable;
        }

        let frame = match self.extractor.extract(item).await {
            Ok(frame) => frame,
            Err(e) => return ItemOutcome::Failed(e),
        };
        let vector = match self.engine.embed(frame.image).await {
            Ok(vector) => vector,
            Err(e) => return ItemOutcome::Failed(e),
        };

        let entry = CacheEntry::new(
            item.path.clone(),
            item.last_modified,
            vector.clone(),
            frame.frame_ref,
        );
        if let Err(e) = self.cache.put(&entry) {
            warn!(path = %item.path, error = %e, "Failed to cache embedding");
        }
        debug!(path = %item.path, dim = vector.dimension(), "Generated embedding");
        ItemOutcome::Generated(vector)
    }

    /// A fresh cached vector for `item`, if there is one.
    ///
    /// Storage errors and entries from a model of a different dimension are
    /// treated as misses.
    fn cached_vector(&self, item: &MediaItem) -> Option<EmbeddingVector> {
        let entry = match self.cache.get(&item.path) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(path = %item.path, error = %e, "Cache lookup failed, regenerating");
                return None;
            }
        };

        if !entry.is_fresh_for(item) {
            debug!(
                path = %item.path,
                cached = entry.last_modified,
                current = item.last_modified,
                "Cache entry stale"
            );
            return None;
        }
        if let Some(info) = self.engine.info() {
            if info.dimension != entry.embedding.dimension() {
                debug!(path = %item.path, "Cache entry from a different model");
                return None;
            }
        }
        Some(entry.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use lens_embeddings::{ExtractedFrame, ImageEmbedder, ModelInfo, StillImage};
    use lens_storage::{EmbeddingStore, NoOpCache, StorageError};
    use lens_types::MediaKind;
    use tempfile::TempDir;

    use crate::progress::{NoOpItemErrorCallback, NoOpProgressCallback};

    /// Embeds the first pixel's color. Counts calls.
    struct PixelEmbedder {
        info: ModelInfo,
        calls: Arc<AtomicUsize>,
    }

    impl ImageEmbedder for PixelEmbedder {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, image: &StillImage) -> Result<EmbeddingVector, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let p = image.as_rgb().get_pixel(0, 0);
            Ok(EmbeddingVector::new(vec![
                p[0] as f32 + 1.0,
                p[1] as f32,
                p[2] as f32,
            ]))
        }
    }

    fn pixel_engine(calls: Arc<AtomicUsize>) -> Arc<EmbeddingEngine> {
        Arc::new(EmbeddingEngine::with_model(Arc::new(PixelEmbedder {
            info: ModelInfo {
                name: "pixel".to_string(),
                dimension: 3,
                input_size: 1,
            },
            calls,
        })))
    }

    /// Produces a 1x1 still whose color depends on the path length; fails on request.
    #[derive(Default)]
    struct ScriptedExtractor {
        fail: HashSet<String>,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn failing(paths: &[&str]) -> Self {
            Self {
                fail: paths.iter().map(|p| p.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameExtractor for ScriptedExtractor {
        async fn extract(&self, item: &MediaItem) -> Result<ExtractedFrame, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.contains(&item.path) {
                return Err(EmbeddingError::FrameExtractionFailed {
                    path: item.path.clone(),
                    reason: "scripted failure".to_string(),
                });
            }
            let shade = (item.path.len() * 20 % 255) as u8;
            Ok(ExtractedFrame {
                image: StillImage::from_rgb(RgbImage::from_pixel(1, 1, Rgb([shade, 10, 200]))),
                frame_ref: item.path.clone(),
            })
        }
    }

    fn items(n: usize) -> Vec<MediaItem> {
        (1..=n)
            .map(|i| {
                MediaItem::from_bytes(
                    format!("item{}.jpg", i),
                    MediaKind::Image,
                    1_000 + i as i64,
                    vec![0u8],
                )
            })
            .collect()
    }

    fn store() -> (Arc<dyn EmbeddingCache>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = EmbeddingStore::open(temp.path()).unwrap();
        (Arc::new(store), temp)
    }

    fn config(concurrency: usize) -> IndexingConfig {
        IndexingConfig {
            concurrency,
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let result = BatchIndexer::new(
            Arc::new(NoOpCache),
            Arc::new(ScriptedExtractor::default()),
            pixel_engine(Arc::new(AtomicUsize::new(0))),
            config(0),
        );
        assert!(matches!(result, Err(IndexingError::Config(_))));
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let (cache, _temp) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let indexer = BatchIndexer::new(
            cache,
            Arc::new(ScriptedExtractor::failing(&["item3.jpg"])),
            pixel_engine(Arc::clone(&calls)),
            config(1),
        )
        .unwrap();

        let reports = Mutex::new(Vec::new());
        let errors = Mutex::new(Vec::new());
        let outcome = indexer
            .run(
                &items(5),
                &|p: &IndexingProgress| reports.lock().unwrap().push(*p),
                &|item: &MediaItem, e: &EmbeddingError| {
                    errors.lock().unwrap().push((item.path.clone(), e.to_string()))
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.index.len(), 4);
        assert!(!outcome.index.contains("item3.jpg"));
        assert_eq!(outcome.ai_status, AiStatus::Available);
        assert!(!outcome.cancelled);

        let errors = errors.into_inner().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "item3.jpg");

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 5);
        let processed: Vec<usize> = reports.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![1, 2, 3, 4, 5]);
        let last = reports.last().unwrap();
        assert_eq!((last.succeeded, last.failed), (4, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_second_run_served_from_cache() {
        let (cache, _temp) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = Arc::new(ScriptedExtractor::default());
        let indexer = BatchIndexer::new(
            cache,
            Arc::clone(&extractor) as Arc<dyn FrameExtractor>,
            pixel_engine(Arc::clone(&calls)),
            config(1),
        )
        .unwrap();
        let collection = items(4);
        let token = CancellationToken::new();

        let first = indexer
            .run(&collection, &NoOpProgressCallback, &NoOpItemErrorCallback, &token)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let second = indexer
            .run(&collection, &NoOpProgressCallback, &NoOpItemErrorCallback, &token)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 4);
        assert_eq!(first.index.len(), second.index.len());
        for (path, vector) in &first.index {
            let cached = second.index.get(path).unwrap();
            for (a, b) in vector.as_slice().iter().zip(cached.as_slice()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[tokio::test]
    async fn test_stale_entry_regenerated() {
        let (cache, _temp) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let indexer = BatchIndexer::new(
            Arc::clone(&cache),
            Arc::new(ScriptedExtractor::default()),
            pixel_engine(Arc::clone(&calls)),
            config(1),
        )
        .unwrap();
        let token = CancellationToken::new();

        let original = MediaItem::from_bytes("a.jpg", MediaKind::Image, 1, vec![0u8]);
        indexer
            .run(&[original], &NoOpProgressCallback, &NoOpItemErrorCallback, &token)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let touched = MediaItem::from_bytes("a.jpg", MediaKind::Image, 2, vec![0u8]);
        let outcome = indexer
            .run(&[touched], &NoOpProgressCallback, &NoOpItemErrorCallback, &token)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.index.len(), 1);
        assert_eq!(cache.get("a.jpg").unwrap().unwrap().last_modified, 2);
    }

    #[tokio::test]
    async fn test_model_failure_disables_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let engine = Arc::new(EmbeddingEngine::new(
            move || -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::Download("offline".to_string()))
            },
        ));
        let extractor = Arc::new(ScriptedExtractor::default());
        let indexer = BatchIndexer::new(
            Arc::new(NoOpCache),
            Arc::clone(&extractor) as Arc<dyn FrameExtractor>,
            engine,
            config(1),
        )
        .unwrap();

        let error_count = AtomicUsize::new(0);
        let outcome = indexer
            .run(
                &items(3),
                &NoOpProgressCallback,
                &|_: &MediaItem, _: &EmbeddingError| {
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome.ai_status, AiStatus::Disabled(ref r) if r.contains("offline")));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(error_count.load(Ordering::SeqCst), 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.progress.failed, 3);
        assert_eq!(outcome.progress.processed, 3);
    }

    #[tokio::test]
    async fn test_fully_cached_run_never_loads_model() {
        let (cache, _temp) = store();
        for item in items(2) {
            cache
                .put(&CacheEntry::new(
                    item.path.clone(),
                    item.last_modified,
                    EmbeddingVector::new(vec![1.0, 0.0, 0.0]),
                    item.path.clone(),
                ))
                .unwrap();
        }

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let engine = Arc::new(EmbeddingEngine::new(
            move || -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EmbeddingError::ModelLoadFailed("should not load".to_string()))
            },
        ));
        let indexer = BatchIndexer::new(
            cache,
            Arc::new(ScriptedExtractor::default()),
            Arc::clone(&engine),
            config(1),
        )
        .unwrap();

        let outcome = indexer
            .run(
                &items(2),
                &NoOpProgressCallback,
                &NoOpItemErrorCallback,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.index.len(), 2);
        assert_eq!(outcome.ai_status, AiStatus::Available);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(!engine.is_loaded());
    }

    #[tokio::test]
    async fn test_all_items_failing_is_degraded() {
        let indexer = BatchIndexer::new(
            Arc::new(NoOpCache),
            Arc::new(ScriptedExtractor::failing(&["item1.jpg", "item2.jpg"])),
            pixel_engine(Arc::new(AtomicUsize::new(0))),
            config(1),
        )
        .unwrap();

        let outcome = indexer
            .run(
                &items(2),
                &NoOpProgressCallback,
                &NoOpItemErrorCallback,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.ai_status, AiStatus::Degraded);
        assert!(outcome.index.is_empty());
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let indexer = BatchIndexer::new(
            Arc::new(NoOpCache),
            Arc::new(ScriptedExtractor::default()),
            pixel_engine(Arc::new(AtomicUsize::new(0))),
            config(1),
        )
        .unwrap();
        let outcome = indexer
            .run(
                &[],
                &NoOpProgressCallback,
                &NoOpItemErrorCallback,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.progress, IndexingProgress::default());
        assert_eq!(outcome.ai_status, AiStatus::Available);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let indexer = BatchIndexer::new(
            Arc::new(NoOpCache),
            Arc::new(ScriptedExtractor::default()),
            pixel_engine(Arc::clone(&calls)),
            config(1),
        )
        .unwrap();

        let token = CancellationToken::new();
        let stopper = token.clone();
        let outcome = indexer
            .run(
                &items(5),
                &move |p: &IndexingProgress| {
                    if p.processed == 2 {
                        stopper.cancel();
                    }
                },
                &NoOpItemErrorCallback,
                &token,
            )
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.index.len(), 2);
        assert_eq!(outcome.progress.processed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_run_keeps_progress_monotonic() {
        let (cache, _temp) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let indexer = BatchIndexer::new(
            cache,
            Arc::new(ScriptedExtractor::failing(&["item4.jpg"])),
            pixel_engine(Arc::clone(&calls)),
            config(4),
        )
        .unwrap();

        let reports = Mutex::new(Vec::new());
        let outcome = indexer
            .run(
                &items(12),
                &|p: &IndexingProgress| reports.lock().unwrap().push(p.processed),
                &NoOpItemErrorCallback,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(reports.into_inner().unwrap(), (1..=12).collect::<Vec<_>>());
        assert_eq!(outcome.index.len(), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_cache_errors_treated_as_misses() {
        struct BrokenCache;
        impl EmbeddingCache for BrokenCache {
            fn get(&self, _path: &str) -> Result<Option<CacheEntry>, StorageError> {
                Err(StorageError::Unavailable("disk gone".to_string()))
            }
            fn put(&self, _entry: &CacheEntry) -> Result<(), StorageError> {
                Err(StorageError::Unavailable("disk gone".to_string()))
            }
            fn delete(&self, _path: &str) -> Result<(), StorageError> {
                Ok(())
            }
            fn clear(&self) -> Result<usize, StorageError> {
                Ok(0)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let indexer = BatchIndexer::new(
            Arc::new(BrokenCache),
            Arc::new(ScriptedExtractor::default()),
            pixel_engine(Arc::clone(&calls)),
            config(1),
        )
        .unwrap();

        let outcome = indexer
            .run(
                &items(3),
                &NoOpProgressCallback,
                &NoOpItemErrorCallback,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.index.len(), 3);
        assert_eq!(outcome.progress.failed, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
