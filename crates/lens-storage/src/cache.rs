//! The embedding cache contract used by the batch indexer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use lens_types::CacheEntry;

use crate::db::EmbeddingStore;
use crate::error::StorageError;

/// Durable path -> embedding store.
///
/// `get` does not check freshness: callers compare `last_modified` themselves
/// (see [`CacheEntry::is_fresh_for`]). Writers to different paths never
/// conflict; writers to the same path are last-write-wins.
pub trait EmbeddingCache: Send + Sync {
    /// Look up by path.
    fn get(&self, path: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// Upsert keyed by `entry.path`.
    fn put(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Remove one path.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Remove everything. Returns the number of entries removed.
    fn clear(&self) -> Result<usize, StorageError>;

    /// Batch lookup; each path is present only if found.
    fn get_many(&self, paths: &[&str]) -> Result<HashMap<String, CacheEntry>, StorageError> {
        let mut found = HashMap::new();
        for path in paths {
            if let Some(entry) = self.get(path)? {
                found.insert((*path).to_string(), entry);
            }
        }
        Ok(found)
    }

    /// Whether writes outlive the process.
    fn is_durable(&self) -> bool {
        true
    }
}

impl EmbeddingCache for EmbeddingStore {
    fn get(&self, path: &str) -> Result<Option<CacheEntry>, StorageError> {
        self.get_entry(path)
    }

    fn put(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        self.put_entry(entry)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.delete_entry(path)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        self.clear_entries()
    }

    fn get_many(&self, paths: &[&str]) -> Result<HashMap<String, CacheEntry>, StorageError> {
        self.get_entries(paths)
    }
}

/// Cache that stores nothing. Used when the durable store is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCache;

impl EmbeddingCache for NoOpCache {
    fn get(&self, _path: &str) -> Result<Option<CacheEntry>, StorageError> {
        Ok(None)
    }

    fn put(&self, _entry: &CacheEntry) -> Result<(), StorageError> {
        Ok(())
    }

    fn delete(&self, _path: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn clear(&self) -> Result<usize, StorageError> {
        Ok(0)
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// Open the durable store, or fall back to [`NoOpCache`] when it cannot be opened.
pub fn open_or_degrade(path: &Path) -> Arc<dyn EmbeddingCache> {
    match EmbeddingStore::open(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(path = ?path, error = %e, "Embedding cache unavailable, continuing uncached");
            Arc::new(NoOpCache)
        }
    }
}
