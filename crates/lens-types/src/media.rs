//! Media items supplied by the browsing layer.
//!
//! A [`MediaItem`] is identified by its `path`. Raw bytes are never held
//! open by the item itself: callers acquire a [`MediaHandle`] with
//! [`MediaItem::open`] and the bytes are released when the handle drops.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::LensError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "mkv", "avi"];

/// Kind of media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
}

impl MediaKind {
    /// Infer the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the raw bytes of a media item live.
#[derive(Clone)]
enum MediaSource {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

/// A single image or video in the loaded collection.
///
/// Immutable for the session. Identity is `path`.
#[derive(Clone)]
pub struct MediaItem {
    /// Unique path within the collection
    pub path: String,
    /// Image or video
    pub kind: MediaKind,
    /// Source-provided modification timestamp (ms since epoch)
    pub last_modified: i64,
    source: MediaSource,
}

impl MediaItem {
    /// Build an item from a file on disk, reading its mtime.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LensError> {
        let path = path.as_ref();
        let display = path.to_string_lossy().to_string();

        let kind =
            MediaKind::from_path(path).ok_or_else(|| LensError::UnsupportedMedia(display.clone()))?;

        let metadata = std::fs::metadata(path).map_err(|source| LensError::MediaUnreadable {
            path: display.clone(),
            source,
        })?;
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self {
            path: display,
            kind,
            last_modified,
            source: MediaSource::File(path.to_path_buf()),
        })
    }

    /// Build an item over bytes already held in memory.
    pub fn from_bytes(
        path: impl Into<String>,
        kind: MediaKind,
        last_modified: i64,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            last_modified,
            source: MediaSource::Bytes(bytes.into()),
        }
    }

    /// Path of the backing file, if the item is file-backed.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            MediaSource::File(p) => Some(p.as_path()),
            MediaSource::Bytes(_) => None,
        }
    }

    /// Acquire the raw bytes. Released when the returned handle drops.
    ///
    /// Blocking for file-backed items; call from a blocking context.
    pub fn open(&self) -> Result<MediaHandle<'_>, LensError> {
        let bytes: Arc<[u8]> = match &self.source {
            MediaSource::File(p) => std::fs::read(p)
                .map_err(|source| LensError::MediaUnreadable {
                    path: self.path.clone(),
                    source,
                })?
                .into(),
            MediaSource::Bytes(b) => Arc::clone(b),
        };
        trace!(path = %self.path, len = bytes.len(), "Acquired media bytes");
        Ok(MediaHandle { item: self, bytes })
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.kind == other.kind
            && self.last_modified == other.last_modified
    }
}

impl Eq for MediaItem {}

/// Scoped access to a media item's raw bytes.
pub struct MediaHandle<'a> {
    item: &'a MediaItem,
    bytes: Arc<[u8]>,
}

impl MediaHandle<'_> {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Backing file, when tools that need a path (ffmpeg) can read it directly.
    pub fn file_path(&self) -> Option<&Path> {
        self.item.file_path()
    }
}

impl Drop for MediaHandle<'_> {
    fn drop(&mut self) {
        trace!(path = %self.item.path, "Released media bytes");
    }
}
