//! Durable embedding cache for media-lens.
//!
//! Provides RocksDB-backed storage with:
//! - One record per media path, keyed by path
//! - Idempotent upserts (last write wins)
//! - Batch lookups via multi-get
//! - A no-op cache for running uncached when storage is unavailable

pub mod cache;
pub mod column_families;
pub mod db;
pub mod error;

pub use cache::{open_or_degrade, EmbeddingCache, NoOpCache};
pub use db::{CacheStats, EmbeddingStore};
pub use error::StorageError;
