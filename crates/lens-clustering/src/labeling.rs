//! Heuristic theme labels for clusters.
//!
//! Labels come from a fixed ordered list and are assigned by cluster id,
//! cycling when there are more clusters than labels. They are not derived
//! from cluster content.

/// Theme names, in assignment order.
pub const THEME_LABELS: [&str; 10] = [
    "Nature & Landscapes",
    "People & Portraits",
    "Urban & Architecture",
    "Food & Drink",
    "Animals & Pets",
    "Travel & Adventure",
    "Events & Celebrations",
    "Art & Design",
    "Sports & Activities",
    "Night & Low Light",
];

/// Label of the catch-all group used for collections too small to cluster.
pub const UNGROUPED_LABEL: &str = "Ungrouped";

/// Trait for naming clusters.
pub trait ClusterLabeler: Send + Sync {
    /// Label for the cluster with the given 0-based id.
    fn label(&self, cluster_id: usize) -> String;

    /// Label for the single catch-all cluster.
    fn ungrouped(&self) -> String {
        UNGROUPED_LABEL.to_string()
    }
}

/// Cycles through [`THEME_LABELS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThemeLabeler;

impl ClusterLabeler for ThemeLabeler {
    fn label(&self, cluster_id: usize) -> String {
        THEME_LABELS[cluster_id % THEME_LABELS.len()].to_string()
    }
}
