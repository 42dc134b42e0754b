//! Vector similarity functions and nearest-neighbour ranking.
//!
//! Pure Rust implementations without external dependencies.

use lens_types::{MediaItem, SessionEmbeddingIndex};

use crate::error::ClusteringError;

fn check_dims(a: &[f32], b: &[f32]) -> Result<(), ClusteringError> {
    if a.len() != b.len() {
        return Err(ClusteringError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Calculate cosine similarity between two vectors.
///
/// Returns value in [-1.0, 1.0] where 1.0 = identical direction. A zero
/// vector has similarity 0.0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, ClusteringError> {
    check_dims(a, b)?;

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (norm_a * norm_b))
}

/// Calculate Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32, ClusteringError> {
    check_dims(a, b)?;
    Ok(squared_distance(a, b).sqrt())
}

/// Squared Euclidean distance; callers have already checked dimensions.
#[inline]
pub(crate) fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Mean of several vectors. Empty input yields an empty vector.
pub fn calculate_centroid(vectors: &[&[f32]]) -> Result<Vec<f32>, ClusteringError> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };

    let n = vectors.len() as f32;
    let mut centroid = vec![0.0f32; first.len()];
    for vector in vectors {
        check_dims(first, vector)?;
        for (acc, &val) in centroid.iter_mut().zip(vector.iter()) {
            *acc += val;
        }
    }
    for val in centroid.iter_mut() {
        *val /= n;
    }
    Ok(centroid)
}

/// A media item with its similarity to some query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem<'a> {
    pub item: &'a MediaItem,
    pub score: f32,
}

/// Rank `candidates` by cosine similarity to `target`, most similar first.
///
/// The target itself and candidates without an embedding are left out.
/// Equal scores keep their order in `candidates`.
pub fn rank_by_similarity<'a>(
    target: &MediaItem,
    candidates: &'a [MediaItem],
    index: &SessionEmbeddingIndex,
) -> Result<Vec<ScoredItem<'a>>, ClusteringError> {
    let query = index
        .get(&target.path)
        .ok_or_else(|| ClusteringError::MissingEmbedding(target.path.clone()))?;

    let mut ranked = Vec::with_capacity(candidates.len());
    for item in candidates {
        if item.path == target.path {
            continue;
        }
        let Some(vector) = index.get(&item.path) else {
            continue;
        };
        ranked.push(ScoredItem {
            item,
            score: cosine_similarity(query.as_slice(), vector.as_slice())?,
        });
    }

    // sort_by is stable: ties stay in collection order
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(ranked)
}

/// The target followed by its `limit` nearest neighbours.
pub fn find_similar<'a>(
    target: &'a MediaItem,
    items: &'a [MediaItem],
    index: &SessionEmbeddingIndex,
    limit: usize,
) -> Result<Vec<ScoredItem<'a>>, ClusteringError> {
    let ranked = rank_by_similarity(target, items, index)?;

    let mut result = Vec::with_capacity(limit.min(ranked.len()) + 1);
    result.push(ScoredItem {
        item: target,
        score: 1.0,
    });
    result.extend(ranked.into_iter().take(limit));
    Ok(result)
}
