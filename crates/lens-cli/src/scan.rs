//! Directory scanning for media files.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use lens_types::{MediaItem, MediaKind};

/// Collect every image and video under `root`, sorted by path.
///
/// Hidden entries are skipped. Files that cannot be read are logged and
/// left out rather than failing the scan.
pub fn scan_media(root: &Path) -> Result<Vec<MediaItem>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let mut items = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || MediaKind::from_path(entry.path()).is_none() {
            continue;
        }

        match MediaItem::from_file(entry.path()) {
            Ok(item) => items.push(item),
            Err(e) => warn!(path = ?entry.path(), error = %e, "Skipping media file"),
        }
    }

    debug!(root = ?root, count = items.len(), "Scanned collection");
    Ok(items)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
