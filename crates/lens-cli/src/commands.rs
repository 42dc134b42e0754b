//! Command implementations for media-lens.
//!
//! Every collection command scans the directory, runs the batch indexer
//! against the durable cache, then hands the session index to the
//! clustering or similarity functions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use lens_clustering::{find_similar, ClusterEngine};
use lens_embeddings::{EmbeddingEngine, MediaFrameExtractor, ModelCache};
use lens_indexing::{
    AiStatus, BatchIndexer, CancellationToken, IndexingOutcome, LoggingItemErrorCallback,
    LoggingProgressCallback,
};
use lens_storage::{open_or_degrade, EmbeddingCache, EmbeddingStore};
use lens_types::{MediaItem, Settings};

use crate::cli::CacheCommands;
use crate::scan::scan_media;

/// Flags that override file and environment configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub cache_path: Option<String>,
    pub concurrency: Option<usize>,
}

/// Load configuration (defaults -> file -> env) and apply CLI overrides.
pub fn load_settings(overrides: &CliOverrides) -> Result<Settings> {
    let mut settings =
        Settings::load(overrides.config_path.as_deref()).context("Failed to load configuration")?;

    if let Some(log_level) = &overrides.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(cache_path) = &overrides.cache_path {
        settings.cache_path = cache_path.clone();
    }
    if let Some(concurrency) = overrides.concurrency {
        settings.indexing.concurrency = concurrency;
    }
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn setup(overrides: &CliOverrides) -> Result<Settings> {
    let settings = load_settings(overrides)?;
    init_logging(&settings)?;
    Ok(settings)
}

/// Open the cache, creating its parent directory. Falls back to running uncached.
fn open_cache(settings: &Settings) -> Arc<dyn EmbeddingCache> {
    let path = settings.expanded_cache_path();
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = ?parent, error = %e, "Failed to create cache directory");
        }
    }
    let cache = open_or_degrade(&path);
    if !cache.is_durable() {
        eprintln!("Embedding cache unavailable; continuing without caching.");
    }
    cache
}

/// Where and which CLIP weights to load.
fn model_cache(settings: &Settings) -> ModelCache {
    ModelCache::new(settings.expanded_model_cache_dir(), settings.model_repo.clone())
        .with_revision(settings.model_revision.clone())
}

/// Cancel the token on Ctrl-C so an interrupted run still returns its partial index.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after in-flight items");
            trigger.cancel();
        }
    });
    token
}

/// Scan `dir` and index it. Prints the run summary.
async fn index_collection(settings: &Settings, dir: &Path) -> Result<(Vec<MediaItem>, IndexingOutcome)> {
    let items = scan_media(dir)?;
    info!(dir = ?dir, count = items.len(), "Loaded collection");

    let cache = open_cache(settings);
    let engine = EmbeddingEngine::shared(model_cache(settings));
    let extractor = Arc::new(MediaFrameExtractor::new(settings.video.clone()));

    let indexer = BatchIndexer::new(cache, extractor, engine, settings.indexing.clone())
        .context("Failed to create indexer")?;
    let outcome = indexer
        .run(
            &items,
            &LoggingProgressCallback::new(settings.indexing.progress_every),
            &LoggingItemErrorCallback,
            &cancel_on_ctrl_c(),
        )
        .await;

    println!(
        "Indexed {} of {} items ({} failed) in {} ms{}",
        outcome.progress.succeeded,
        outcome.progress.total,
        outcome.progress.failed,
        outcome.elapsed_ms,
        if outcome.cancelled { ", cancelled" } else { "" }
    );
    Ok((items, outcome))
}

/// Print the user-facing notice for an unavailable AI state.
///
/// Returns false when similarity features cannot be used.
fn report_ai_status(status: &AiStatus) -> bool {
    match status {
        AiStatus::Available => true,
        AiStatus::Degraded => {
            println!("No embeddings could be generated; similarity features are unavailable.");
            false
        }
        AiStatus::Disabled(reason) => {
            println!("AI features disabled: {}", reason);
            false
        }
    }
}

/// Whether a run left enough behind to group or rank.
///
/// An interrupted run is reported before the AI status, since its partial
/// index says nothing about the model.
fn features_usable(outcome: &IndexingOutcome) -> bool {
    if outcome.cancelled {
        println!(
            "Indexing was interrupted after {} of {} items; rerun to finish.",
            outcome.progress.processed, outcome.progress.total
        );
        return false;
    }
    report_ai_status(&outcome.ai_status)
}

/// `media-lens index <dir>`
pub async fn handle_index(overrides: &CliOverrides, dir: &Path) -> Result<()> {
    let settings = setup(overrides)?;
    let (_, outcome) = index_collection(&settings, dir).await?;
    report_ai_status(&outcome.ai_status);
    Ok(())
}

/// `media-lens themes <dir>`
pub async fn handle_themes(overrides: &CliOverrides, dir: &Path, seed: Option<u64>) -> Result<()> {
    let mut settings = setup(overrides)?;
    if seed.is_some() {
        settings.clustering.seed = seed;
    }

    let (items, outcome) = index_collection(&settings, dir).await?;
    if !features_usable(&outcome) {
        return Ok(());
    }

    let engine = ClusterEngine::new(settings.clustering.clone()).context("Invalid clustering config")?;
    let clusters = engine
        .cluster_by_theme(&items, &outcome.index)
        .context("Theme clustering failed")?;

    for cluster in &clusters {
        println!(
            "\n{} ({} items, representative: {})",
            cluster.label,
            cluster.len(),
            cluster.representative.path
        );
        for member in &cluster.members {
            println!("  {}", member.path);
        }
    }
    let unembedded = items.len() - outcome.index.len();
    if unembedded > 0 {
        println!("\n{} items without embeddings were not grouped", unembedded);
    }
    Ok(())
}

/// `media-lens similar <dir> <file>`
pub async fn handle_similar(
    overrides: &CliOverrides,
    dir: &Path,
    file: &Path,
    limit: usize,
) -> Result<()> {
    let settings = setup(overrides)?;
    let (items, outcome) = index_collection(&settings, dir).await?;
    if !features_usable(&outcome) {
        return Ok(());
    }

    let Some(target) = find_item(&items, file) else {
        bail!("{} is not part of {}", file.display(), dir.display());
    };

    let similar = find_similar(target, &items, &outcome.index, limit)
        .with_context(|| format!("Cannot rank neighbours of {}", target.path))?;

    for (rank, scored) in similar.iter().enumerate() {
        println!("{:>3}. {:.4}  {}", rank, scored.score, scored.item.path);
    }
    Ok(())
}

/// Locate `file` in the scanned collection, tolerating relative paths.
fn find_item<'a>(items: &'a [MediaItem], file: &Path) -> Option<&'a MediaItem> {
    let wanted = canonical(file);
    items
        .iter()
        .find(|item| item.file_path().map(canonical).as_ref() == Some(&wanted))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// `media-lens cache ...`
pub fn handle_cache(overrides: &CliOverrides, command: CacheCommands) -> Result<()> {
    let settings = setup(overrides)?;
    let path = settings.expanded_cache_path();
    let store = EmbeddingStore::open(&path)
        .with_context(|| format!("Failed to open embedding cache at {}", path.display()))?;

    match command {
        CacheCommands::Stats => {
            let stats = store.stats().context("Failed to read cache stats")?;
            println!("Cache path: {}", path.display());
            println!("Entries:    {}", stats.entry_count);
            println!("Disk usage: {} bytes", stats.disk_usage_bytes);
        }
        CacheCommands::Delete { path: media_path } => {
            store
                .delete_entry(&media_path)
                .with_context(|| format!("Failed to delete {}", media_path))?;
            println!("Deleted cached embedding for {}", media_path);
        }
        CacheCommands::Clear => {
            let removed = store.clear_entries().context("Failed to clear cache")?;
            println!("Removed {} cached embeddings", removed);
        }
    }
    store.flush().context("Failed to flush cache")?;
    Ok(())
}
