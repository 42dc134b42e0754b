//! Graceful degradation E2E tests for media-lens.
//!
//! The pipeline must never panic when the cache or the model is missing,
//! and must report the right AI status.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{index_items, unloadable_engine, TestHarness, BLUE, RED};
use lens_indexing::AiStatus;
use lens_storage::{open_or_degrade, EmbeddingCache, NoOpCache};

/// A cache path that cannot be opened degrades to running uncached.
#[tokio::test]
async fn test_unopenable_cache_runs_uncached() {
    let harness = TestHarness::new();
    let items = vec![harness.add_image("a.png", RED), harness.add_image("b.png", BLUE)];

    // A regular file where the database directory should be
    let blocker = harness.cache_dir.with_extension("file");
    std::fs::write(&blocker, b"x").unwrap();
    let cache = open_or_degrade(&blocker);
    assert!(!cache.is_durable());

    let first = index_items(cache.clone(), harness.engine(), &items, 1).await;
    assert_eq!(first.outcome.index.len(), 2);
    assert_eq!(first.outcome.ai_status, AiStatus::Available);

    // Nothing was persisted, so the next run embeds again
    index_items(cache, harness.engine(), &items, 1).await;
    assert_eq!(harness.embed_count(), 4);
}

/// A model that cannot load disables AI features without per-item errors.
#[tokio::test]
async fn test_missing_model_disables_ai() {
    let harness = TestHarness::new();
    let items = vec![harness.add_image("a.png", RED), harness.add_image("b.png", BLUE)];

    let report = index_items(Arc::new(NoOpCache), unloadable_engine(), &items, 2).await;

    assert!(report.outcome.index.is_empty());
    assert!(report.failed_paths.is_empty());
    assert_eq!(report.outcome.progress.failed, 2);
    match report.outcome.ai_status {
        AiStatus::Disabled(reason) => assert!(reason.contains("weights missing"), "{}", reason),
        other => panic!("Expected Disabled, got {:?}", other),
    }
}

/// Cached embeddings stay usable when the model is gone.
#[tokio::test]
async fn test_warm_cache_survives_missing_model() {
    let harness = TestHarness::new();
    let items = vec![harness.add_image("a.png", RED), harness.add_image("b.png", BLUE)];
    index_items(harness.open_store(), harness.engine(), &items, 1).await;

    let report = index_items(harness.open_store(), unloadable_engine(), &items, 1).await;
    assert_eq!(report.outcome.index.len(), 2);
    assert_eq!(report.outcome.ai_status, AiStatus::Available);
}

/// Every item failing leaves the model usable but no features to offer.
#[tokio::test]
async fn test_all_items_failing_is_degraded() {
    let harness = TestHarness::new();
    let items = vec![harness.add_corrupt("a.png"), harness.add_corrupt("b.jpg")];

    let report = index_items(harness.open_store(), harness.engine(), &items, 1).await;

    assert_eq!(report.outcome.ai_status, AiStatus::Degraded);
    assert_eq!(report.failed_paths.len(), 2);
    assert_eq!(harness.embed_count(), 0);
}

/// An empty collection is trivially available.
#[tokio::test]
async fn test_empty_collection() {
    let harness = TestHarness::new();
    let report = index_items(harness.open_store(), harness.engine(), &[], 1).await;
    assert!(report.outcome.index.is_empty());
    assert!(report.progress.is_empty());
    assert_eq!(report.outcome.ai_status, AiStatus::Available);
}
