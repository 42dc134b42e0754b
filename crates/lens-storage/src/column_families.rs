//! Column family definitions for RocksDB.
//!
//! - embeddings: one CacheEntry per media path (point lookups, overwrites)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for cached embeddings
pub const CF_EMBEDDINGS: &str = "embeddings";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_EMBEDDINGS];

/// Embeddings are written once per path and read by exact key.
fn embeddings_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts.optimize_for_point_lookup(64);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![ColumnFamilyDescriptor::new(
        CF_EMBEDDINGS,
        embeddings_options(),
    )]
}
