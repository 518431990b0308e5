// File discovery for an image set folder

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use walkdir::WalkDir;

use crate::constants::{DELETED_FILES_FOLDER, IMAGE_EXTENSIONS, PATH_DB_SEPARATOR, VIDEO_EXTENSIONS};
use crate::data::image_row::ImageRow;

/// Whether a path has an image or video extension
pub fn is_media_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// Discover every media file below the root, skipping soft deleted files and
/// hidden directories.
pub fn discover_media_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || e.file_name()
                    .to_str()
                    .map(|n| n != DELETED_FILES_FOLDER && !n.starts_with('.'))
                    .unwrap_or(false)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_media_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    // Sort by path for consistent ordering
    files.sort();
    files
}

/// Split a discovered path into its stored (relative path, file name) pair.
/// The relative path always uses forward slashes.
pub fn split_relative(root: &Path, path: &Path) -> Option<(String, String)> {
    let relative = path.strip_prefix(root).ok()?;
    let file = relative.file_name()?.to_str()?.to_string();
    let folders: Option<Vec<&str>> = relative
        .parent()
        .map(|p| p.components().map(|c| c.as_os_str().to_str()).collect())
        .unwrap_or(Some(Vec::new()));
    Some((folders?.join(&PATH_DB_SEPARATOR.to_string()), file))
}

/// Rows for files not yet in the image set. The capture time starts as the
/// file's modification time; metadata reconciliation refines it later.
pub fn new_file_rows(root: &Path, known: &HashSet<(String, String)>) -> Vec<ImageRow> {
    let folder = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    discover_media_files(root)
        .into_iter()
        .filter_map(|path| {
            let key = match split_relative(root, &path) {
                Some(key) => key,
                None => {
                    log::warn!("Skipping {}: path is not valid UTF-8", path.display());
                    return None;
                }
            };
            if known.contains(&key) {
                return None;
            }
            let mut row = ImageRow::for_new_file(0, &folder, &key.0, &key.1);
            if let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) {
                let taken: DateTime<Utc> = modified.into();
                if let Err(e) = row.set_date_time_offset(taken, Duration::zero()) {
                    log::warn!("{}: {}", path.display(), e);
                }
            }
            Some(row)
        })
        .collect()
}
