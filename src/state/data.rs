/// Shared data structures for the gallery state
///
/// These structs represent the data model that flows between
/// the scanner, the thumbnail cache and the UI layer.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File extensions recognised as images (compared lowercase)
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Number of images shown on a folder tile
const FOLDER_PREVIEW_COUNT: usize = 4;

/// Check if a path has a supported image extension
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// A folder discovered by the scanner together with the images it directly contains.
/// Rebuilt on every refresh, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFolder {
    /// Directory containing the images
    pub path: PathBuf,
    /// Image paths, sorted by path
    pub images: Vec<PathBuf>,
}

impl GalleryFolder {
    pub fn new(path: PathBuf, mut images: Vec<PathBuf>) -> Self {
        images.sort();
        Self { path, images }
    }

    /// Final path component, used as the tile title
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The first few images, drawn as a 2x2 mosaic on the folder tile
    pub fn preview_images(&self) -> &[PathBuf] {
        &self.images[..self.images.len().min(FOLDER_PREVIEW_COUNT)]
    }
}

/// File details shown in the "File Info" panel
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub file_name: String,
    pub directory: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    /// Pixel dimensions, None if the header could not be read
    pub dimensions: Option<(u32, u32)>,
}

impl FileInfo {
    pub fn read(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = meta.modified()?.into();

        let dimensions = match image::image_dimensions(path) {
            Ok(dims) => Some(dims),
            Err(e) => {
                log::debug!("Could not read dimensions of {}: {}", path.display(), e);
                None
            }
        };

        Ok(Self {
            file_name: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            size_bytes: meta.len(),
            modified,
            dimensions,
        })
    }

    pub fn size_label(&self) -> String {
        format!("{} ({} bytes)", human_readable_size(self.size_bytes), self.size_bytes)
    }
}

/// Format a byte count with 1024-based units (B, KB, MB, GB, TB)
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions_are_case_insensitive() {
        assert!(is_supported_image(Path::new("/photos/a.JPG")));
        assert!(is_supported_image(Path::new("/photos/b.webp")));
        assert!(!is_supported_image(Path::new("/photos/c.txt")));
        assert!(!is_supported_image(Path::new("/photos/noext")));
        assert!(!is_supported_image(Path::new("/photos/a.jpg.meta.json")));
    }

    #[test]
    fn test_folder_preview_is_at_most_four() {
        let images = (0..6).map(|i| PathBuf::from(format!("/p/{}.jpg", i))).collect();
        let folder = GalleryFolder::new(PathBuf::from("/p"), images);
        assert_eq!(folder.preview_images().len(), 4);
        assert_eq!(folder.name(), "p");

        let small = GalleryFolder::new(PathBuf::from("/q"), vec![PathBuf::from("/q/x.png")]);
        assert_eq!(small.preview_images().len(), 1);
    }

    #[test]
    fn test_human_readable_size() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(512), "512 B");
        assert_eq!(human_readable_size(1536), "1.50 KB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_file_info_reads_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbImage::new(7, 3).save(&path).unwrap();

        let info = FileInfo::read(&path).unwrap();
        assert_eq!(info.file_name, "tiny.png");
        assert_eq!(info.directory, dir.path());
        assert_eq!(info.dimensions, Some((7, 3)));
        assert!(info.size_bytes > 0);
    }
}
