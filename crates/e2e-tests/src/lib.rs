//! End-to-end test infrastructure for media-lens.
//!
//! Provides a shared TestHarness and helpers for E2E tests covering the
//! scan-to-cluster pipeline: real files on disk, the real frame extractor
//! and the RocksDB cache, with a deterministic color embedder standing in
//! for the CLIP model.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use image::{Rgb, RgbImage};

use lens_embeddings::{
    EmbeddingEngine, EmbeddingError, ImageEmbedder, MediaFrameExtractor, ModelInfo, StillImage,
};
use lens_indexing::{BatchIndexer, CancellationToken, IndexingOutcome, IndexingProgress};
use lens_storage::{EmbeddingCache, EmbeddingStore};
use lens_types::{EmbeddingVector, IndexingConfig, MediaItem, VideoConfig};

pub const RED: [u8; 3] = [220, 20, 20];
pub const BLUE: [u8; 3] = [20, 20, 220];
pub const GREEN: [u8; 3] = [20, 220, 20];

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Collection root
    pub media_dir: PathBuf,
    /// RocksDB cache directory
    pub cache_dir: PathBuf,
    /// Number of embed calls made by engines from [`TestHarness::engine`]
    pub embed_calls: Arc<AtomicUsize>,
}

impl TestHarness {
    /// Create a new test harness with empty media and cache directories.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");
        let cache_dir = temp_dir.path().join("cache");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        Self {
            _temp_dir: temp_dir,
            media_dir,
            cache_dir,
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open the durable cache. Only one store may be open at a time.
    pub fn open_store(&self) -> Arc<dyn EmbeddingCache> {
        Arc::new(EmbeddingStore::open(&self.cache_dir).expect("Failed to open cache"))
    }

    /// An engine backed by [`ColorEmbedder`] that counts into `embed_calls`.
    pub fn engine(&self) -> Arc<EmbeddingEngine> {
        Arc::new(EmbeddingEngine::with_model(Arc::new(ColorEmbedder::new(
            self.embed_calls.clone(),
        ))))
    }

    pub fn embed_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Write a uniform PNG into the collection and return its item.
    pub fn add_image(&self, name: &str, color: [u8; 3]) -> MediaItem {
        let path = self.media_dir.join(name);
        write_png(&path, color);
        MediaItem::from_file(&path).expect("Failed to build media item")
    }

    /// Write a file with an image extension that does not decode.
    pub fn add_corrupt(&self, name: &str) -> MediaItem {
        let path = self.media_dir.join(name);
        std::fs::write(&path, b"definitely not a png").expect("Failed to write file");
        MediaItem::from_file(&path).expect("Failed to build media item")
    }

    /// Rewrite an image with a new color and a later mtime, as an editor would.
    pub fn touch_image(&self, name: &str, color: [u8; 3], mtime_ms: u64) -> MediaItem {
        let path = self.media_dir.join(name);
        write_png(&path, color);
        set_mtime(&path, mtime_ms);
        MediaItem::from_file(&path).expect("Failed to build media item")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Embeds the color of the top-left pixel. Deterministic; counts calls.
pub struct ColorEmbedder {
    info: ModelInfo,
    calls: Arc<AtomicUsize>,
}

impl ColorEmbedder {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            info: ModelInfo {
                name: "color".to_string(),
                dimension: 3,
                input_size: 1,
            },
            calls,
        }
    }
}

impl ImageEmbedder for ColorEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, image: &StillImage) -> Result<EmbeddingVector, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let p = image.as_rgb().get_pixel(0, 0);
        Ok(EmbeddingVector::new(vec![
            p[0] as f32,
            p[1] as f32,
            p[2] as f32,
        ]))
    }
}

/// An engine whose model never loads.
pub fn unloadable_engine() -> Arc<EmbeddingEngine> {
    Arc::new(EmbeddingEngine::new(
        || -> Result<Arc<dyn ImageEmbedder>, EmbeddingError> {
            Err(EmbeddingError::ModelNotFound("weights missing".to_string()))
        },
    ))
}

/// Everything observed during one indexing run.
pub struct RunReport {
    pub outcome: IndexingOutcome,
    /// Paths reported through the item-error callback, in report order
    pub failed_paths: Vec<String>,
    /// (processed, total) of every progress report, in report order
    pub progress: Vec<(usize, usize)>,
}

/// Index `items` through the real frame extractor.
pub async fn index_items(
    cache: Arc<dyn EmbeddingCache>,
    engine: Arc<EmbeddingEngine>,
    items: &[MediaItem],
    concurrency: usize,
) -> RunReport {
    let indexer = BatchIndexer::new(
        cache,
        Arc::new(MediaFrameExtractor::new(VideoConfig::default())),
        engine,
        IndexingConfig {
            concurrency,
            ..Default::default()
        },
    )
    .expect("Failed to create indexer");

    let failed = Mutex::new(Vec::new());
    let progress = Mutex::new(Vec::new());
    let outcome = indexer
        .run(
            items,
            &|p: &IndexingProgress| progress.lock().unwrap().push((p.processed, p.total)),
            &|item: &MediaItem, _e: &EmbeddingError| failed.lock().unwrap().push(item.path.clone()),
            &CancellationToken::new(),
        )
        .await;

    RunReport {
        outcome,
        failed_paths: failed.into_inner().unwrap(),
        progress: progress.into_inner().unwrap(),
    }
}

/// Element-wise comparison for vectors that went through a JSON round trip.
pub fn approx_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
}

/// Write a 4x4 uniform PNG.
pub fn write_png(path: &Path, color: [u8; 3]) {
    RgbImage::from_pixel(4, 4, Rgb(color))
        .save(path)
        .expect("Failed to write png");
}

/// Set a file's mtime to `ms` milliseconds after the epoch.
pub fn set_mtime(path: &Path, ms: u64) {
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_millis(ms))
        .expect("Failed to set mtime");
}
