use std::path::PathBuf;
use walkdir::WalkDir;

use crate::error::Result;
use crate::query::wildcard::{contains_wildcards, glob_match};

/// Enumerate candidate image files under a root directory.
///
/// Applies the extension allow-list and the optional path filters. A
/// filter containing `*`/`?` is matched as a wildcard against the full
/// path; otherwise it is a case-insensitive substring test.
pub fn discover_images(
    root: &PathBuf,
    extensions: &[String],
    recursive: bool,
    path_filters: &[String],
) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    let walker = if recursive {
        WalkDir::new(root).follow_links(false)
    } else {
        WalkDir::new(root).follow_links(false).max_depth(1)
    };

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(ext) = path.extension() else {
            continue;
        };
        let ext_lower = ext.to_string_lossy().to_lowercase();
        if !extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
            continue;
        }

        if !path_filters.is_empty() {
            let path_str = path.to_string_lossy();
            if !path_filters.iter().any(|f| filter_matches(f, &path_str)) {
                continue;
            }
        }

        images.push(path.to_path_buf());
    }

    // Sort by path for consistent ordering
    images.sort();

    Ok(images)
}

fn filter_matches(filter: &str, path: &str) -> bool {
    if contains_wildcards(filter) {
        glob_match(filter, path)
    } else {
        path.to_lowercase().contains(&filter.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn discovers_images_recursively() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.png")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let images = discover_images(&dir_path, &extensions(), true, &[]).unwrap();
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn non_recursive_skips_subdirectories() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo2.jpg")).unwrap();

        let images = discover_images(&dir_path, &extensions(), false, &[]).unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn substring_filter_narrows_results() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        fs::create_dir(dir.path().join("vacation")).unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        File::create(dir.path().join("vacation/beach.jpg")).unwrap();
        File::create(dir.path().join("work/badge.jpg")).unwrap();

        let filters = vec!["vacation".to_string()];
        let images = discover_images(&dir_path, &extensions(), true, &filters).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].to_string_lossy().contains("beach.jpg"));
    }

    #[test]
    fn wildcard_filter_matches_full_path() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        File::create(dir.path().join("img_001.jpg")).unwrap();
        File::create(dir.path().join("img_002.jpg")).unwrap();
        File::create(dir.path().join("scan_001.jpg")).unwrap();

        let filters = vec!["*img_00?.jpg".to_string()];
        let images = discover_images(&dir_path, &extensions(), true, &filters).unwrap();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn sidecar_json_files_are_not_discovered() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        File::create(dir.path().join("photo.jpg")).unwrap();
        File::create(dir.path().join("photo.jpg.description.json")).unwrap();
        File::create(dir.path().join("photo.jpg.exif.json")).unwrap();

        let images = discover_images(&dir_path, &extensions(), true, &[]).unwrap();
        assert_eq!(images.len(), 1);
    }
}
