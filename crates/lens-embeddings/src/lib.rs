//! # lens-embeddings
//!
//! Local visual embeddings for media-lens using Candle.
//!
//! Turns a media item into one representative still image and the still
//! into an L2-normalized vector, without any server round-trip.
//!
//! ## Features
//! - Local inference via Candle (CLIP ViT-B/32 vision tower, 512 dimensions)
//! - Automatic model file caching (download once, then offline)
//! - Process-wide load gate: the model is loaded at most once, concurrent
//!   callers wait on the same in-flight load, failures can be retried
//! - Frame extraction: images decoded directly, videos sampled with ffmpeg

pub mod cache;
pub mod clip;
pub mod engine;
pub mod error;
pub mod frames;
pub mod model;
pub mod video;

pub use crate::clip::ClipEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, WEIGHTS_FILE};
pub use engine::{ClipLoader, EmbeddingEngine, ModelLoader};
pub use error::EmbeddingError;
pub use frames::{ExtractedFrame, FrameExtractor, MediaFrameExtractor};
pub use model::{ImageEmbedder, ModelInfo, StillImage};
pub use video::{sample_time, VideoSampler};
