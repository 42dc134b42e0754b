//! Progress tracking and caller-supplied sinks for indexing runs.

use tracing::{info, warn};

use lens_embeddings::EmbeddingError;
use lens_types::MediaItem;

/// Counters for one indexing run.
///
/// Reset at the start of each run. `processed` only ever grows and always
/// equals `succeeded + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingProgress {
    /// Items in the run.
    pub total: usize,
    /// Items finished, successfully or not.
    pub processed: usize,
    /// Items with an embedding in the session index.
    pub succeeded: usize,
    /// Items without one.
    pub failed: usize,
}

impl IndexingProgress {
    /// Create a tracker for a run of `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Record an item that ended up in the index.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
        self.processed += 1;
    }

    /// Record an item that did not.
    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.processed += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Trait for receiving progress updates after every item.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &IndexingProgress);
}

impl<F> ProgressCallback for F
where
    F: Fn(&IndexingProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &IndexingProgress) {
        self(progress)
    }
}

/// Trait for receiving per-item failures.
pub trait ItemErrorCallback: Send + Sync {
    fn on_item_error(&self, item: &MediaItem, error: &EmbeddingError);
}

impl<F> ItemErrorCallback for F
where
    F: Fn(&MediaItem, &EmbeddingError) + Send + Sync,
{
    fn on_item_error(&self, item: &MediaItem, error: &EmbeddingError) {
        self(item, error)
    }
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _progress: &IndexingProgress) {}
}

/// Discards item errors.
pub struct NoOpItemErrorCallback;

impl ItemErrorCallback for NoOpItemErrorCallback {
    fn on_item_error(&self, _item: &MediaItem, _error: &EmbeddingError) {}
}

/// A callback that logs progress at info level every `every` items and at the end.
pub struct LoggingProgressCallback {
    every: usize,
}

impl LoggingProgressCallback {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: &IndexingProgress) {
        if progress.processed.is_multiple_of(self.every) || progress.is_complete() {
            info!(
                processed = progress.processed,
                total = progress.total,
                succeeded = progress.succeeded,
                failed = progress.failed,
                "Indexing progress"
            );
        }
    }
}

/// Logs each failed item at warn level.
pub struct LoggingItemErrorCallback;

impl ItemErrorCallback for LoggingItemErrorCallback {
    fn on_item_error(&self, item: &MediaItem, error: &EmbeddingError) {
        warn!(path = %item.path, kind = %item.kind, error = %error, "Failed to index item");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_counters() {
        let mut progress = IndexingProgress::new(3);
        assert!(!progress.is_complete());

        progress.record_success();
        progress.record_failure();
        progress.record_success();

        assert_eq!(
            progress,
            IndexingProgress {
                total: 3,
                processed: 3,
                succeeded: 2,
                failed: 1,
            }
        );
        assert!(progress.is_complete());
    }

    #[test]
    fn test_closure_is_progress_callback() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: &IndexingProgress| seen.lock().unwrap().push(p.processed);

        let mut progress = IndexingProgress::new(2);
        progress.record_success();
        callback.on_progress(&progress);
        progress.record_success();
        callback.on_progress(&progress);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_logging_callback_accepts_zero_interval() {
        let callback = LoggingProgressCallback::new(0);
        let mut progress = IndexingProgress::new(1);
        progress.record_success();
        callback.on_progress(&progress);
    }
}
