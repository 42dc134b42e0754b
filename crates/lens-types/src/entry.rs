//! Durable cache record kept per media path.

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingVector;
use crate::media::MediaItem;

/// One cached embedding.
///
/// Never mutated in place: a regenerated embedding replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Media path (primary key)
    pub path: String,
    /// Modification timestamp the embedding was computed from
    #[serde(rename = "lastModified")]
    pub last_modified: i64,
    /// The embedding itself
    pub embedding: EmbeddingVector,
    /// Reference to the still the embedding was computed from
    #[serde(rename = "representativeFrameRef")]
    pub representative_frame_ref: String,
}

impl CacheEntry {
    pub fn new(
        path: impl Into<String>,
        last_modified: i64,
        embedding: EmbeddingVector,
        representative_frame_ref: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            last_modified,
            embedding,
            representative_frame_ref: representative_frame_ref.into(),
        }
    }

    /// An entry is valid for an item iff both path and timestamp match.
    /// Anything else is a miss, never corruption.
    pub fn is_fresh_for(&self, item: &MediaItem) -> bool {
        self.path == item.path && self.last_modified == item.last_modified
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
