// File discovery for reconciliation

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::constants::{CACHE_FOLDER, VIDEO_EXTENSIONS};
use crate::error::{CacheError, Result};

/// Discover all video files under a source root, sorted by path
pub fn discover_media_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CacheError::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_cache_folder(e))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
    {
        let path = entry.path();
        if entry.file_type().is_file() && is_media_file(path) {
            files.push(path.to_path_buf());
        }
    }

    // Sort by path for consistent ordering
    files.sort();

    Ok(files)
}

fn is_cache_folder(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_name() == CACHE_FOLDER
}

/// Check if a file is a video file based on extension
pub fn is_media_file(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_lowercase(),
        None => return false,
    };

    VIDEO_EXTENSIONS.contains(&ext.as_str())
}
