use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::state::data::{is_supported_image, GalleryFolder};

/// How deep the scanner descends into each configured root
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Every subdirectory, each becoming its own folder group
    #[default]
    Recursive,
    /// Only the images directly inside the root
    Flat,
}

impl ScanMode {
    pub const ALL: [ScanMode; 2] = [ScanMode::Recursive, ScanMode::Flat];
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Recursive => write!(f, "Include Subfolders"),
            ScanMode::Flat => write!(f, "Top Folder Only"),
        }
    }
}

/// Images found by a scan, grouped by containing directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    folders: BTreeMap<PathBuf, GalleryFolder>,
}

impl ScanResult {
    /// Folders ordered by path
    pub fn folders(&self) -> impl Iterator<Item = &GalleryFolder> {
        self.folders.values()
    }

    pub fn folder(&self, path: &Path) -> Option<&GalleryFolder> {
        self.folders.get(path)
    }

    /// All images, folder by folder. This is the order thumbnails are generated in.
    pub fn all_images(&self) -> Vec<PathBuf> {
        self.folders
            .values()
            .flat_map(|f| f.images.iter().cloned())
            .collect()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn image_count(&self) -> usize {
        self.folders.values().map(GalleryFolder::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// "N folders, M images" for the status bar
    pub fn summary(&self) -> String {
        format!("{} folders, {} images", self.folder_count(), self.image_count())
    }
}

/// Enumerate all configured roots and group supported images by folder.
///
/// Unreadable roots or entries are logged and skipped; the scan never fails as a whole.
pub fn scan_folders(roots: &[PathBuf], mode: ScanMode) -> ScanResult {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for root in roots {
        log::info!("Scanning folder: {}", root.display());

        if !root.is_dir() {
            log::warn!("Could not scan folder {}: not a directory", root.display());
            continue;
        }

        let max_depth = match mode {
            ScanMode::Recursive => usize::MAX,
            ScanMode::Flat => 1,
        };

        // Walk the directory tree
        for entry in WalkDir::new(root).follow_links(true).max_depth(max_depth) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            // Only process files (not directories)
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_supported_image(path) {
                continue;
            }

            if let Some(parent) = path.parent() {
                grouped
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(path.to_path_buf());
            }
        }
    }

    let folders: BTreeMap<PathBuf, GalleryFolder> = grouped
        .into_iter()
        .map(|(dir, mut images)| {
            // Overlapping roots would otherwise list a file twice
            images.sort();
            images.dedup();
            (dir.clone(), GalleryFolder::new(dir, images))
        })
        .collect();

    let result = ScanResult { folders };
    log::info!("Scan complete: {}", result.summary());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.jpg"));
        touch(&root.join("a.PNG"));
        touch(&root.join("notes.txt"));
        touch(&root.join("a.PNG.meta.json"));
        touch(&root.join("trip/day1.webp"));
        touch(&root.join("trip/day2.jpeg"));
        touch(&root.join("empty/readme.md"));
        dir
    }

    #[test]
    fn test_recursive_groups_by_folder() {
        let dir = sample_tree();
        let root = dir.path().to_path_buf();

        let result = scan_folders(&[root.clone()], ScanMode::Recursive);

        assert_eq!(result.folder_count(), 2);
        assert_eq!(result.image_count(), 4);
        assert!(result.folder(&root.join("empty")).is_none());

        let top = result.folder(&root).unwrap();
        assert_eq!(top.images, vec![root.join("a.PNG"), root.join("b.jpg")]);

        let trip = result.folder(&root.join("trip")).unwrap();
        assert_eq!(trip.len(), 2);
        assert_eq!(result.summary(), "2 folders, 4 images");
    }

    #[test]
    fn test_flat_ignores_subdirectories() {
        let dir = sample_tree();
        let root = dir.path().to_path_buf();

        let result = scan_folders(&[root.clone()], ScanMode::Flat);

        assert_eq!(result.folder_count(), 1);
        assert_eq!(result.image_count(), 2);
    }

    #[test]
    fn test_all_images_in_folder_order() {
        let dir = sample_tree();
        let root = dir.path().to_path_buf();

        let all = scan_folders(&[root.clone()], ScanMode::Recursive).all_images();

        assert_eq!(
            all,
            vec![
                root.join("a.PNG"),
                root.join("b.jpg"),
                root.join("trip/day1.webp"),
                root.join("trip/day2.jpeg"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = sample_tree();
        let roots = vec![dir.path().join("does-not-exist"), dir.path().join("trip")];

        let result = scan_folders(&roots, ScanMode::Recursive);

        assert_eq!(result.image_count(), 2);
    }

    #[test]
    fn test_overlapping_roots_do_not_duplicate() {
        let dir = sample_tree();
        let roots = vec![dir.path().to_path_buf(), dir.path().join("trip")];

        let result = scan_folders(&roots, ScanMode::Recursive);

        assert_eq!(result.image_count(), 4);
    }

    #[test]
    fn test_scan_mode_labels_and_ids() {
        assert_eq!(ScanMode::Flat.to_string(), "Top Folder Only");
        assert_eq!(serde_json::to_string(&ScanMode::Flat).unwrap(), "\"flat\"");
        assert_eq!(ScanMode::ALL[0], ScanMode::default());
    }

    #[test]
    fn test_no_roots_is_empty() {
        assert!(scan_folders(&[], ScanMode::Recursive).is_empty());
    }
}
