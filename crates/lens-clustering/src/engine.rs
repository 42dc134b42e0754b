//! Theme clustering over a session's embeddings.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use lens_types::{ClusteringConfig, MediaItem, SessionEmbeddingIndex};

use crate::error::ClusteringError;
use crate::kmeans::{kmeans, KMeansResult};
use crate::labeling::{ClusterLabeler, ThemeLabeler};
use crate::similarity::{calculate_centroid, euclidean_distance};

/// One theme group.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// 0-based cluster id from the k-means run
    pub id: usize,
    pub label: String,
    /// Members in input order
    pub members: Vec<MediaItem>,
    /// Member closest to the centroid
    pub representative: MediaItem,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups items into themes with k-means.
pub struct ClusterEngine {
    config: ClusteringConfig,
    labeler: Box<dyn ClusterLabeler>,
}

impl ClusterEngine {
    pub fn new(config: ClusteringConfig) -> Result<Self, ClusteringError> {
        config.validate().map_err(ClusteringError::InvalidConfig)?;
        Ok(Self {
            config,
            labeler: Box::new(ThemeLabeler),
        })
    }

    /// Replace the default theme labeler.
    pub fn with_labeler(mut self, labeler: impl ClusterLabeler + 'static) -> Self {
        self.labeler = Box::new(labeler);
        self
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Number of clusters requested for `count` embedded items.
    pub fn cluster_count(&self, count: usize) -> usize {
        (count / self.config.items_per_cluster)
            .clamp(self.config.min_clusters, self.config.max_clusters)
    }

    /// Partition `items` into theme clusters, largest first.
    ///
    /// Items without an embedding in `index` are left out entirely. With no
    /// embedded item the result is empty; below `min_items` it is a single
    /// catch-all cluster. Otherwise k-means clusters whose centroids lie
    /// within `merge_distance` are merged.
    pub fn cluster_by_theme(
        &self,
        items: &[MediaItem],
        index: &SessionEmbeddingIndex,
    ) -> Result<Vec<Cluster>, ClusteringError> {
        let (embedded, vectors): (Vec<&MediaItem>, Vec<&[f32]>) = items
            .iter()
            .filter_map(|item| index.get(&item.path).map(|v| (item, v.as_slice())))
            .unzip();

        debug!(
            total = items.len(),
            embedded = embedded.len(),
            "Clustering by theme"
        );

        if embedded.is_empty() {
            return Ok(Vec::new());
        }

        if embedded.len() < self.config.min_items {
            return Ok(vec![Cluster {
                id: 0,
                label: self.labeler.ungrouped(),
                members: embedded.iter().map(|item| (*item).clone()).collect(),
                representative: embedded[0].clone(),
            }]);
        }

        let k = self.cluster_count(embedded.len());
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let result = kmeans(&vectors, k, self.config.max_iterations, &mut rng);

        let groups = group_assignments(&result, &vectors)?;
        let populated = groups.len();
        let groups = merge_close_groups(groups, &vectors, self.config.merge_distance)?;

        let mut clusters = Vec::with_capacity(groups.len());
        for group in groups {
            let mut representative: Option<(usize, f32)> = None;
            for &pos in &group.positions {
                let dist = euclidean_distance(vectors[pos], &group.centroid)?;
                // Strict comparison: first occurrence wins ties
                if representative.is_none_or(|(_, best)| dist < best) {
                    representative = Some((pos, dist));
                }
            }
            let Some((representative, _)) = representative else {
                continue;
            };
            clusters.push(Cluster {
                id: group.id,
                label: self.labeler.label(group.id),
                members: group.positions.iter().map(|&pos| embedded[pos].clone()).collect(),
                representative: embedded[representative].clone(),
            });
        }

        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then(a.id.cmp(&b.id)));

        info!(
            items = embedded.len(),
            requested = k,
            populated,
            clusters = clusters.len(),
            iterations = result.iterations,
            "Theme clustering complete"
        );
        Ok(clusters)
    }
}

/// Members of one cluster, as positions into the embedded vectors.
#[derive(Debug)]
struct Group {
    id: usize,
    positions: Vec<usize>,
    centroid: Vec<f32>,
}

/// Populated k-means clusters in id order, centroids recomputed from members.
fn group_assignments(
    result: &KMeansResult,
    vectors: &[&[f32]],
) -> Result<Vec<Group>, ClusteringError> {
    let mut groups = Vec::with_capacity(result.centroids.len());
    for id in 0..result.centroids.len() {
        let positions: Vec<usize> = result
            .assignments
            .iter()
            .enumerate()
            .filter(|(_, &cluster)| cluster == id)
            .map(|(pos, _)| pos)
            .collect();
        // k-means can leave clusters unpopulated
        if positions.is_empty() {
            continue;
        }
        let members: Vec<&[f32]> = positions.iter().map(|&pos| vectors[pos]).collect();
        groups.push(Group {
            id,
            centroid: calculate_centroid(&members)?,
            positions,
        });
    }
    Ok(groups)
}

/// Merge groups whose centroids are at most `max_distance` apart.
///
/// The closest pair is merged first and the lower id survives. A non-positive
/// distance disables merging.
fn merge_close_groups(
    mut groups: Vec<Group>,
    vectors: &[&[f32]],
    max_distance: f32,
) -> Result<Vec<Group>, ClusteringError> {
    if max_distance <= 0.0 {
        return Ok(groups);
    }

    loop {
        let mut closest: Option<(usize, usize, f32)> = None;
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                let dist = euclidean_distance(&groups[i].centroid, &groups[j].centroid)?;
                if dist <= max_distance && closest.is_none_or(|(_, _, best)| dist < best) {
                    closest = Some((i, j, dist));
                }
            }
        }
        let Some((i, j, distance)) = closest else {
            return Ok(groups);
        };

        // j > i, so removing j leaves i in place
        let absorbed = groups.remove(j);
        let kept = &mut groups[i];
        debug!(kept = kept.id, merged = absorbed.id, distance, "Merging near-identical clusters");
        kept.positions.extend(absorbed.positions);
        kept.positions.sort_unstable();
        let members: Vec<&[f32]> = kept.positions.iter().map(|&pos| vectors[pos]).collect();
        kept.centroid = calculate_centroid(&members)?;
    }
}
