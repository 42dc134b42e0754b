//! Lloyd's k-means with k-means++ initialization.
//!
//! Randomness only enters through the caller's RNG, so a seeded RNG gives
//! reproducible assignments.

use rand::Rng;
use tracing::debug;

use crate::similarity::squared_distance;

/// Outcome of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster index per input vector, in input order.
    pub assignments: Vec<usize>,
    /// One centroid per cluster. Clusters that lost all members keep their
    /// last centroid.
    pub centroids: Vec<Vec<f32>>,
    /// Iterations performed.
    pub iterations: usize,
    /// True when assignments stopped changing before the iteration cap.
    pub converged: bool,
}

impl KMeansResult {
    /// Member count per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &cluster in &self.assignments {
            sizes[cluster] += 1;
        }
        sizes
    }
}

/// Partition `vectors` into at most `k` clusters.
///
/// All vectors must share one dimension. `k` is clamped to the number of
/// vectors; with no vectors or `k == 0` the result is empty.
pub fn kmeans<R: Rng>(
    vectors: &[&[f32]],
    k: usize,
    max_iterations: usize,
    rng: &mut R,
) -> KMeansResult {
    let k = k.min(vectors.len());
    if k == 0 {
        return KMeansResult {
            assignments: Vec::new(),
            centroids: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let mut centroids = kmeans_plus_plus_init(vectors, k, rng);
    let mut assignments = vec![usize::MAX; vectors.len()];
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..max_iterations {
        iterations += 1;

        let mut changed = false;
        for (i, vector) in vectors.iter().enumerate() {
            let best = nearest_centroid(vector, &centroids);
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        if !changed {
            converged = true;
            break;
        }

        update_centroids(vectors, &assignments, &mut centroids);
    }

    debug!(k, n = vectors.len(), iterations, converged, "k-means finished");

    KMeansResult {
        assignments,
        centroids,
        iterations,
        converged,
    }
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (j, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(vector, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

/// Recompute each centroid as the mean of its members.
fn update_centroids(vectors: &[&[f32]], assignments: &[usize], centroids: &mut [Vec<f32>]) {
    let dim = centroids.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0f32; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (vector, &cluster) in vectors.iter().zip(assignments) {
        counts[cluster] += 1;
        for (acc, &val) in sums[cluster].iter_mut().zip(vector.iter()) {
            *acc += val;
        }
    }

    for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
        // Empty clusters keep their previous centroid
        if count > 0 {
            *centroid = sum.into_iter().map(|v| v / count as f32).collect();
        }
    }
}

/// Choose `k` initial centroids from `vectors` (k <= vectors.len()).
///
/// The first is uniform; each next one is drawn with probability
/// proportional to its squared distance from the nearest chosen centroid.
/// When every remaining distance is zero, the first unchosen vector is taken.
fn kmeans_plus_plus_init<R: Rng>(
    vectors: &[&[f32]],
    k: usize,
    rng: &mut R,
) -> Vec<Vec<f32>> {
    let n = vectors.len();
    let mut chosen = vec![false; n];
    let mut centroids = Vec::with_capacity(k);

    let first = rng.random_range(0..n);
    chosen[first] = true;
    centroids.push(vectors[first].to_vec());

    // Squared distance from each vector to its nearest chosen centroid
    let mut min_distances: Vec<f64> = vectors
        .iter()
        .map(|v| squared_distance(v, vectors[first]) as f64)
        .collect();

    while centroids.len() < k {
        let total: f64 = min_distances.iter().sum();

        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &d) in min_distances.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative > target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        let next = match next {
            Some(i) => i,
            None => match chosen.iter().position(|c| !c) {
                Some(i) => i,
                None => break,
            },
        };

        chosen[next] = true;
        centroids.push(vectors[next].to_vec());
        for (i, vector) in vectors.iter().enumerate() {
            let d = squared_distance(vector, vectors[next]) as f64;
            if d < min_distances[i] {
                min_distances[i] = d;
            }
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..6 {
            let jitter = i as f32 * 0.01;
            points.push(vec![1.0 + jitter, 0.0]);
        }
        for i in 0..6 {
            let jitter = i as f32 * 0.01;
            points.push(vec![-1.0, 5.0 + jitter]);
        }
        points
    }

    fn as_slices(points: &[Vec<f32>]) -> Vec<&[f32]> {
        points.iter().map(|p| p.as_slice()).collect()
    }

    #[test]
    fn test_separates_two_blobs() {
        let points = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);
        let result = kmeans(&as_slices(&points), 2, 100, &mut rng);

        assert!(result.converged);
        let a = result.assignments[0];
        let b = result.assignments[6];
        assert_ne!(a, b);
        assert!(result.assignments[..6].iter().all(|&c| c == a));
        assert!(result.assignments[6..].iter().all(|&c| c == b));
        assert_eq!(result.cluster_sizes(), vec![6, 6]);
    }

    #[test]
    fn test_same_seed_same_result() {
        let points = two_blobs();
        let slices = as_slices(&points);
        let first = kmeans(&slices, 3, 100, &mut StdRng::seed_from_u64(42));
        let second = kmeans(&slices, 3, 100, &mut StdRng::seed_from_u64(42));
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.centroids, second.centroids);
    }

    #[test]
    fn test_k_clamped_to_input() {
        let points = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let result = kmeans(&as_slices(&points), 5, 10, &mut StdRng::seed_from_u64(1));
        assert_eq!(result.centroids.len(), 2);
        assert_ne!(result.assignments[0], result.assignments[1]);
    }

    #[test]
    fn test_identical_points_leave_extra_clusters_empty() {
        let points = vec![vec![0.5, 0.5]; 4];
        let result = kmeans(&as_slices(&points), 3, 10, &mut StdRng::seed_from_u64(3));
        assert_eq!(result.centroids.len(), 3);
        assert_eq!(result.assignments, vec![0, 0, 0, 0]);
        assert_eq!(result.cluster_sizes(), vec![4, 0, 0]);
    }

    #[test]
    fn test_empty_input() {
        let result = kmeans(&[], 3, 10, &mut StdRng::seed_from_u64(0));
        assert!(result.assignments.is_empty());
        assert!(result.centroids.is_empty());
    }

    #[test]
    fn test_iteration_cap_respected() {
        let points = two_blobs();
        let result = kmeans(&as_slices(&points), 2, 1, &mut StdRng::seed_from_u64(9));
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }
}
