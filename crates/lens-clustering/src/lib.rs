//! # lens-clustering
//!
//! Pure, synchronous vector operations over a session's embeddings.
//!
//! ## Features
//! - Cosine similarity and Euclidean distance with dimension checks
//! - Nearest-neighbour ranking with stable tie-breaks ("find similar")
//! - k-means with k-means++ initialization and an injectable seed
//! - Theme grouping: cluster count scales with collection size, one
//!   representative per group, heuristic labels

pub mod engine;
pub mod error;
pub mod kmeans;
pub mod labeling;
pub mod similarity;

pub use engine::{Cluster, ClusterEngine};
pub use error::ClusteringError;
pub use kmeans::{kmeans, KMeansResult};
pub use labeling::{ClusterLabeler, ThemeLabeler, THEME_LABELS, UNGROUPED_LABEL};
pub use similarity::{
    calculate_centroid, cosine_similarity, euclidean_distance, find_similar, rank_by_similarity,
    ScoredItem,
};
