//! Frame extraction: one representative still per media item.

use async_trait::async_trait;
use tracing::trace;

use lens_types::{MediaItem, MediaKind, VideoConfig};

use crate::error::EmbeddingError;
use crate::model::StillImage;
use crate::video::VideoSampler;

/// The still image chosen to represent a media item.
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub image: StillImage,
    /// The item path for images, `<path>#t=<secs>` for videos
    pub frame_ref: String,
}

/// Produces a still image for a media item.
///
/// Abstracted so the batch indexer can be tested without real media.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, item: &MediaItem) -> Result<ExtractedFrame, EmbeddingError>;
}

/// Default extractor: decodes images in-process and samples videos via ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct MediaFrameExtractor {
    video: VideoSampler,
}

impl MediaFrameExtractor {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            video: VideoSampler::new(config),
        }
    }

    async fn decode_image(&self, item: &MediaItem) -> Result<ExtractedFrame, EmbeddingError> {
        let owned = item.clone();
        let image = tokio::task::spawn_blocking(move || {
            let handle = owned
                .open()
                .map_err(|e| EmbeddingError::frame(&owned.path, e))?;
            StillImage::decode(handle.bytes()).map_err(|e| EmbeddingError::frame(&owned.path, e))
        })
        .await
        .map_err(|e| EmbeddingError::frame(&item.path, format!("decode task: {}", e)))??;

        trace!(path = %item.path, w = image.width(), h = image.height(), "Decoded image");
        Ok(ExtractedFrame {
            image,
            frame_ref: item.path.clone(),
        })
    }
}

#[async_trait]
impl FrameExtractor for MediaFrameExtractor {
    async fn extract(&self, item: &MediaItem) -> Result<ExtractedFrame, EmbeddingError> {
        match item.kind {
            MediaKind::Image => self.decode_image(item).await,
            MediaKind::Video => self.video.sample(item).await,
        }
    }
}
