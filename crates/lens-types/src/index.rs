//! Per-session path -> embedding mapping.

use std::collections::hash_map;
use std::collections::HashMap;

use crate::embedding::EmbeddingVector;
use crate::error::LensError;

/// Embeddings for one loaded collection, keyed by media path.
///
/// Built fresh by each indexing run and never persisted as a whole. All
/// vectors share the dimension of the first one inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionEmbeddingIndex {
    vectors: HashMap<String, EmbeddingVector>,
    dimension: Option<usize>,
}

impl SessionEmbeddingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the vector for `path`.
    ///
    /// Returns the previous vector, if any. Fails with `DimensionMismatch`
    /// when the length differs from the vectors already present.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        vector: EmbeddingVector,
    ) -> Result<Option<EmbeddingVector>, LensError> {
        match self.dimension {
            Some(expected) if expected != vector.dimension() => {
                return Err(LensError::DimensionMismatch {
                    expected,
                    actual: vector.dimension(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(vector.dimension()),
        }
        Ok(self.vectors.insert(path.into(), vector))
    }

    pub fn get(&self, path: &str) -> Option<&EmbeddingVector> {
        self.vectors.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.vectors.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Shared vector length, or `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Iterate in arbitrary order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, EmbeddingVector> {
        self.vectors.iter()
    }
}

impl<'a> IntoIterator for &'a SessionEmbeddingIndex {
    type Item = (&'a String, &'a EmbeddingVector);
    type IntoIter = hash_map::Iter<'a, String, EmbeddingVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.vectors.iter()
    }
}
