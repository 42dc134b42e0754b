//! Configuration loading for media-lens.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/media-lens/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::LensError;

/// Batch indexing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Maximum items in flight at once (1 = sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Log progress every N processed items.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_concurrency() -> usize {
    1
}

fn default_progress_every() -> usize {
    25
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            progress_every: default_progress_every(),
        }
    }
}

impl IndexingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be > 0".to_string());
        }
        if self.progress_every == 0 {
            return Err("progress_every must be > 0".to_string());
        }
        Ok(())
    }
}

/// Theme clustering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Seed for k-means++ initialization. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Hard cap on k-means iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Lower bound on K.
    #[serde(default = "default_min_clusters")]
    pub min_clusters: usize,

    /// Upper bound on K.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,

    /// Collection size per requested cluster (K = count / items_per_cluster).
    #[serde(default = "default_items_per_cluster")]
    pub items_per_cluster: usize,

    /// Below this many embedded items everything lands in one catch-all group.
    #[serde(default = "default_min_items")]
    pub min_items: usize,

    /// Clusters whose centroids lie within this Euclidean distance are
    /// merged after k-means. 0 disables merging.
    #[serde(default = "default_merge_distance")]
    pub merge_distance: f32,
}

fn default_max_iterations() -> usize {
    100
}

fn default_min_clusters() -> usize {
    3
}

fn default_max_clusters() -> usize {
    10
}

fn default_items_per_cluster() -> usize {
    10
}

fn default_min_items() -> usize {
    3
}

fn default_merge_distance() -> f32 {
    0.2
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_iterations: default_max_iterations(),
            min_clusters: default_min_clusters(),
            max_clusters: default_max_clusters(),
            items_per_cluster: default_items_per_cluster(),
            min_items: default_min_items(),
            merge_distance: default_merge_distance(),
        }
    }
}

impl ClusteringConfig {
    /// Same defaults with a fixed seed, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be > 0".to_string());
        }
        if self.min_clusters == 0 {
            return Err("min_clusters must be > 0".to_string());
        }
        if self.min_clusters > self.max_clusters {
            return Err(format!(
                "min_clusters ({}) must not exceed max_clusters ({})",
                self.min_clusters, self.max_clusters
            ));
        }
        if self.items_per_cluster == 0 {
            return Err("items_per_cluster must be > 0".to_string());
        }
        if self.merge_distance.is_nan() || self.merge_distance < 0.0 {
            return Err("merge_distance must be >= 0".to_string());
        }
        Ok(())
    }
}

/// Video frame sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe executable
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Latest point in a clip that will be sampled (seconds).
    #[serde(default = "default_max_sample_secs")]
    pub max_sample_secs: f64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_max_sample_secs() -> f64 {
    5.0
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            max_sample_secs: default_max_sample_secs(),
        }
    }
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_sample_secs.is_nan() || self.max_sample_secs < 0.0 {
            return Err(format!(
                "max_sample_secs must be >= 0, got {}",
                self.max_sample_secs
            ));
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB embedding cache
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Directory model weights are downloaded into
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: String,

    /// HuggingFace repository of the vision model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Repository revision holding `model.safetensors`
    #[serde(default = "default_model_revision")]
    pub model_revision: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub video: VideoConfig,
}

fn default_cache_path() -> String {
    ProjectDirs::from("", "", "media-lens")
        .map(|p| p.data_local_dir().join("embeddings"))
        .unwrap_or_else(|| PathBuf::from("./embeddings"))
        .to_string_lossy()
        .to_string()
}

fn default_model_cache_dir() -> String {
    ProjectDirs::from("", "", "media-lens")
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from(".cache/models"))
        .to_string_lossy()
        .to_string()
}

fn default_model_repo() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

/// The repository's default branch ships no safetensors weights.
fn default_model_revision() -> String {
    "d15b5f29721ca72dac15f8526b284be910de18be".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            model_cache_dir: default_model_cache_dir(),
            model_repo: default_model_repo(),
            model_revision: default_model_revision(),
            log_level: default_log_level(),
            indexing: IndexingConfig::default(),
            clustering: ClusteringConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/media-lens/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (LENS_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, LensError> {
        let config_dir = ProjectDirs::from("", "", "media-lens")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("cache_path", default_cache_path())
            .map_err(|e| LensError::Config(e.to_string()))?
            .set_default("model_cache_dir", default_model_cache_dir())
            .map_err(|e| LensError::Config(e.to_string()))?
            .set_default("model_repo", default_model_repo())
            .map_err(|e| LensError::Config(e.to_string()))?
            .set_default("model_revision", default_model_revision())
            .map_err(|e| LensError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| LensError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: LENS_CACHE_PATH, LENS_INDEXING__CONCURRENCY, LENS_CLUSTERING__SEED, ...
        builder = builder.add_source(
            Environment::with_prefix("LENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| LensError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| LensError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), LensError> {
        if self.model_revision.trim().is_empty() {
            return Err(LensError::Config("model_revision must not be empty".to_string()));
        }
        self.indexing
            .validate()
            .and_then(|_| self.clustering.validate())
            .and_then(|_| self.video.validate())
            .map_err(LensError::Config)
    }

    /// Expand a leading `~/` in cache_path.
    pub fn expanded_cache_path(&self) -> PathBuf {
        expand_home(&self.cache_path)
    }

    /// Expand a leading `~/` in model_cache_dir.
    pub fn expanded_model_cache_dir(&self) -> PathBuf {
        expand_home(&self.model_cache_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.model_repo, "openai/clip-vit-base-patch32");
        assert_eq!(settings.model_revision, "d15b5f29721ca72dac15f8526b284be910de18be");
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.indexing.concurrency, 1);
        assert!(settings.clustering.seed.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.clustering.max_iterations, 100);
        assert_eq!(settings.video.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("lens.toml");
        std::fs::write(
            &path,
            "cache_path = \"/tmp/lens-cache\"\n[clustering]\nseed = 7\n[indexing]\nconcurrency = 4\n",
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.cache_path, "/tmp/lens-cache");
        assert_eq!(settings.clustering.seed, Some(7));
        assert_eq!(settings.indexing.concurrency, 4);
        // Untouched sections keep their defaults
        assert_eq!(settings.clustering.max_clusters, 10);
    }

    #[test]
    fn test_model_revision_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("lens.toml");
        std::fs::write(&path, "model_revision = \"refs/pr/15\"\n").unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.model_revision, "refs/pr/15");
        assert_eq!(settings.model_repo, "openai/clip-vit-base-patch32");

        std::fs::write(&path, "model_revision = \"\"\n").unwrap();
        assert!(Settings::load(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[indexing]\nconcurrency = 0\n").unwrap();

        let err = Settings::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(matches!(err, LensError::Config(_)));
    }

    #[test]
    fn test_clustering_config_validation() {
        let mut config = ClusteringConfig::seeded(1);
        assert!(config.validate().is_ok());

        config.min_clusters = 12;
        assert!(config.validate().is_err());

        config.min_clusters = 3;
        config.items_per_cluster = 0;
        assert!(config.validate().is_err());

        config.items_per_cluster = 10;
        config.merge_distance = -0.5;
        assert!(config.validate().is_err());
        config.merge_distance = f32::NAN;
        assert!(config.validate().is_err());
        config.merge_distance = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_video_config_validation() {
        let mut config = VideoConfig::default();
        assert!(config.validate().is_ok());
        config.max_sample_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        let plain = expand_home("/var/data");
        assert_eq!(plain, PathBuf::from("/var/data"));
        let expanded = expand_home("~/lens");
        assert!(expanded.ends_with("lens"));
    }

    #[test]
    fn test_config_serialization() {
        let config = ClusteringConfig::seeded(99);
        let json = serde_json::to_string(&config).unwrap();
        let decoded: ClusteringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.seed, Some(99));
        assert_eq!(decoded.max_clusters, 10);
    }
}
