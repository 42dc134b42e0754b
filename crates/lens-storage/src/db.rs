//! RocksDB wrapper for the embedding cache.
//!
//! Provides:
//! - Database open with column family setup
//! - Point reads, batched multi-gets and single-key upserts
//! - Explicit invalidation (delete one path, clear everything)

use std::collections::HashMap;
use std::path::Path;

use rocksdb::{ColumnFamily, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info, warn};

use lens_types::CacheEntry;

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_EMBEDDINGS};
use crate::error::StorageError;

/// RocksDB-backed embedding store.
pub struct EmbeddingStore {
    db: DB,
}

impl EmbeddingStore {
    /// Open storage at the given path, creating if necessary.
    ///
    /// Any failure to open is reported as [`StorageError::Unavailable`].
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening embedding cache at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;

        Ok(Self { db })
    }

    fn cf(&self) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(CF_EMBEDDINGS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_EMBEDDINGS.to_string()))
    }

    /// Look up an entry by path. Does not check freshness.
    pub fn get_entry(&self, path: &str) -> Result<Option<CacheEntry>, StorageError> {
        match self.db.get_cf(self.cf()?, path.as_bytes())? {
            Some(bytes) => Ok(Some(CacheEntry::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Upsert an entry keyed by its path. A single put is atomic.
    pub fn put_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let value = entry.to_bytes()?;
        self.db.put_cf(self.cf()?, entry.path.as_bytes(), value)?;
        debug!(path = %entry.path, dim = entry.embedding.dimension(), "Stored cache entry");
        Ok(())
    }

    /// Remove the entry for a path (no-op when absent).
    pub fn delete_entry(&self, path: &str) -> Result<(), StorageError> {
        self.db.delete_cf(self.cf()?, path.as_bytes())?;
        debug!(path = %path, "Deleted cache entry");
        Ok(())
    }

    /// Batch lookup. Paths that are absent (or undecodable) are left out.
    pub fn get_entries(&self, paths: &[&str]) -> Result<HashMap<String, CacheEntry>, StorageError> {
        let cf = self.cf()?;
        let results = self
            .db
            .multi_get_cf(paths.iter().map(|p| (cf, p.as_bytes())));

        let mut found = HashMap::with_capacity(paths.len());
        for (path, result) in paths.iter().zip(results) {
            if let Some(bytes) = result? {
                match CacheEntry::from_bytes(&bytes) {
                    Ok(entry) => {
                        found.insert((*path).to_string(), entry);
                    }
                    Err(e) => warn!(path = %path, error = %e, "Skipping undecodable cache entry"),
                }
            }
        }
        Ok(found)
    }

    /// Delete every entry. Returns the number removed.
    pub fn clear_entries(&self) -> Result<usize, StorageError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        let mut count = 0;

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, &key);
            count += 1;
        }

        if count > 0 {
            self.db.write(batch)?;
        }
        info!(count, "Cleared embedding cache");
        Ok(count)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Entry count and on-disk footprint.
    pub fn stats(&self) -> Result<CacheStats, StorageError> {
        let mut entry_count = 0u64;
        for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
            item?;
            entry_count += 1;
        }

        let mut disk_usage_bytes = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    disk_usage_bytes += metadata.len();
                }
            }
        }

        Ok(CacheStats {
            entry_count,
            disk_usage_bytes,
        })
    }
}

/// Statistics about the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Number of cached embeddings
    pub entry_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
