//! # lens-types
//!
//! Shared domain types for media-lens.
//!
//! This crate defines the data structures passed between the indexing,
//! storage and clustering crates:
//! - Media items: identity, kind and scoped access to raw bytes
//! - Embedding vectors: L2-normalized fixed-length float vectors
//! - Cache entries: the durable record kept per media path
//! - Session index: the in-memory path -> embedding map for one collection
//! - Settings: layered configuration for the whole workspace

pub mod config;
pub mod embedding;
pub mod entry;
pub mod error;
pub mod index;
pub mod media;

pub use config::{ClusteringConfig, IndexingConfig, Settings, VideoConfig};
pub use embedding::EmbeddingVector;
pub use entry::CacheEntry;
pub use error::LensError;
pub use index::SessionEmbeddingIndex;
pub use media::{MediaHandle, MediaItem, MediaKind};
