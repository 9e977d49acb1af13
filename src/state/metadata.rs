/// Sidecar metadata store
///
/// Every image may have one `<file name>.meta.json` next to it holding its
/// star rating, color label, tags and non-destructive edits. Updates are
/// read-modify-write with a full-file overwrite.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::edit::EditParams;
use crate::error::{GalleryError, Result};

/// Appended to the full image file name to get the sidecar name
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Highest star rating
pub const MAX_RATING: u8 = 5;

/// Path of the sidecar file for an image
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let mut name = image_path.as_os_str().to_os_string();
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

/// Color label attached to an image
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LabelColor {
    Red,
    Yellow,
    Green,
    Blue,
}

impl LabelColor {
    pub const ALL: [LabelColor; 4] = [
        LabelColor::Red,
        LabelColor::Yellow,
        LabelColor::Green,
        LabelColor::Blue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelColor::Red => "red",
            LabelColor::Yellow => "yellow",
            LabelColor::Green => "green",
            LabelColor::Blue => "blue",
        }
    }

    /// Swatch color as 0xRRGGBB
    pub fn hex(&self) -> u32 {
        match self {
            LabelColor::Red => 0xD16969,
            LabelColor::Yellow => 0xEBCB8B,
            LabelColor::Green => 0xA3BE8C,
            LabelColor::Blue => 0x007ACC,
        }
    }
}

impl fmt::Display for LabelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelColor {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self> {
        LabelColor::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GalleryError::invalid("label color", s))
    }
}

/// Everything stored in an image's sidecar file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ImageMetadata {
    /// Star rating, 0 (unrated) to 5
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_color: Option<LabelColor>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<EditParams>,
}

impl ImageMetadata {
    /// Read the sidecar of `image_path`.
    ///
    /// A missing sidecar yields empty metadata. A sidecar that cannot be
    /// parsed is logged and also treated as empty.
    pub fn load(image_path: &Path) -> Self {
        let meta_path = sidecar_path(image_path);
        let content = match fs::read_to_string(&meta_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Could not read {}: {}", meta_path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<ImageMetadata>(&content) {
            Ok(mut meta) => {
                meta.rating = meta.rating.min(MAX_RATING);
                meta
            }
            Err(e) => {
                log::warn!("Ignoring malformed metadata {}: {}", meta_path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the sidecar of `image_path`, replacing the whole file.
    /// Empty metadata removes the sidecar instead.
    pub fn save(&self, image_path: &Path) -> Result<()> {
        let meta_path = sidecar_path(image_path);

        if self.is_empty() {
            return match fs::remove_file(&meta_path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(&meta_path, json)?;
        log::debug!("Wrote metadata {}", meta_path.display());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Edits, or the neutral parameters when none were saved
    pub fn edits_or_default(&self) -> EditParams {
        self.edits.unwrap_or_default()
    }

    /// Filled and empty stars, e.g. "★★★☆☆"
    pub fn stars(&self) -> String {
        let rating = self.rating.min(MAX_RATING) as usize;
        format!("{}{}", "★".repeat(rating), "☆".repeat(MAX_RATING as usize - rating))
    }
}

/// Read-modify-write helper shared by the setters below
fn update(image_path: &Path, change: impl FnOnce(&mut ImageMetadata)) -> Result<ImageMetadata> {
    let mut meta = ImageMetadata::load(image_path);
    change(&mut meta);
    meta.save(image_path)?;
    Ok(meta)
}

pub fn set_rating(image_path: &Path, rating: u8) -> Result<ImageMetadata> {
    if rating > MAX_RATING {
        return Err(GalleryError::invalid("rating", rating.to_string()));
    }
    update(image_path, |meta| meta.rating = rating)
}

/// Set or clear (`None`) the color label
pub fn set_label(image_path: &Path, color: Option<LabelColor>) -> Result<ImageMetadata> {
    update(image_path, |meta| meta.label_color = color)
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Add a tag; tags are trimmed and lowercased, empty tags are ignored
pub fn add_tag(image_path: &Path, tag: &str) -> Result<ImageMetadata> {
    let tag = normalize_tag(tag);
    if tag.is_empty() {
        return Ok(ImageMetadata::load(image_path));
    }
    update(image_path, |meta| {
        meta.tags.insert(tag);
    })
}

/// Remove a tag, matched the same way `add_tag` stores it
pub fn remove_tag(image_path: &Path, tag: &str) -> Result<ImageMetadata> {
    let tag = normalize_tag(tag);
    update(image_path, |meta| {
        meta.tags.remove(&tag);
    })
}

pub fn save_edits(image_path: &Path, edits: EditParams) -> Result<ImageMetadata> {
    let edits = edits.clamped();
    update(image_path, |meta| {
        meta.edits = if edits.is_unedited() { None } else { Some(edits) };
    })
}

pub fn reset_edits(image_path: &Path) -> Result<ImageMetadata> {
    update(image_path, |meta| meta.edits = None)
}

/// In-memory view of sidecars, so one filtering pass reads each file once.
/// Call `invalidate` after writing metadata for a path.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<PathBuf, ImageMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, image_path: &Path) -> &ImageMetadata {
        self.entries
            .entry(image_path.to_path_buf())
            .or_insert_with(|| ImageMetadata::load(image_path))
    }

    /// Store metadata that was just written
    pub fn put(&mut self, image_path: &Path, meta: ImageMetadata) {
        self.entries.insert(image_path.to_path_buf(), meta);
    }

    pub fn invalidate(&mut self, image_path: &Path) {
        self.entries.remove(image_path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_in(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("holiday.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();
        path
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/photos/a.jpg")),
            PathBuf::from("/photos/a.jpg.meta.json")
        );
    }

    #[test]
    fn test_missing_sidecar_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);
        assert!(ImageMetadata::load(&image).is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);

        let meta = ImageMetadata {
            rating: 4,
            label_color: Some(LabelColor::Green),
            tags: ["beach", "family"].iter().map(|s| s.to_string()).collect(),
            edits: Some(EditParams {
                brightness: -20,
                contrast: 1.25,
                saturation: 0.75,
            }),
        };
        meta.save(&image).unwrap();

        assert!(sidecar_path(&image).exists());
        assert_eq!(ImageMetadata::load(&image), meta);
    }

    #[test]
    fn test_malformed_sidecar_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);
        fs::write(sidecar_path(&image), "{ not json").unwrap();

        assert!(ImageMetadata::load(&image).is_empty());
    }

    #[test]
    fn test_setters_merge_fields() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);

        set_rating(&image, 3).unwrap();
        set_label(&image, Some(LabelColor::Red)).unwrap();
        add_tag(&image, "  Sunset ").unwrap();
        add_tag(&image, "   ").unwrap();

        let meta = ImageMetadata::load(&image);
        assert_eq!(meta.rating, 3);
        assert_eq!(meta.label_color, Some(LabelColor::Red));
        assert_eq!(meta.tags.iter().collect::<Vec<_>>(), vec!["sunset"]);

        remove_tag(&image, "sunset").unwrap();
        set_label(&image, None).unwrap();
        let meta = ImageMetadata::load(&image);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.label_color, None);
        assert_eq!(meta.rating, 3);
    }

    #[test]
    fn test_remove_tag_ignores_case_and_padding() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);

        add_tag(&image, "Sunset").unwrap();
        add_tag(&image, "beach").unwrap();
        let meta = remove_tag(&image, " SUNSET ").unwrap();

        assert_eq!(meta.tags.iter().collect::<Vec<_>>(), vec!["beach"]);
        assert_eq!(ImageMetadata::load(&image), meta);
    }

    #[test]
    fn test_rating_above_max_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);
        assert!(set_rating(&image, 6).is_err());
        assert!(!sidecar_path(&image).exists());
    }

    #[test]
    fn test_clearing_everything_removes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);

        set_rating(&image, 2).unwrap();
        assert!(sidecar_path(&image).exists());

        set_rating(&image, 0).unwrap();
        assert!(!sidecar_path(&image).exists());
    }

    #[test]
    fn test_save_and_reset_edits() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);

        let edits = EditParams {
            brightness: 10,
            ..EditParams::default()
        };
        let meta = save_edits(&image, edits).unwrap();
        assert_eq!(meta.edits, Some(edits));

        let meta = reset_edits(&image).unwrap();
        assert_eq!(meta.edits, None);
        assert_eq!(meta.edits_or_default(), EditParams::default());
    }

    #[test]
    fn test_label_color_parsing() {
        assert_eq!("Blue".parse::<LabelColor>().unwrap(), LabelColor::Blue);
        assert!("purple".parse::<LabelColor>().is_err());
        assert_eq!(LabelColor::Yellow.to_string(), "yellow");
    }

    #[test]
    fn test_stars() {
        let meta = ImageMetadata {
            rating: 2,
            ..ImageMetadata::default()
        };
        assert_eq!(meta.stars(), "★★☆☆☆");
    }

    #[test]
    fn test_metadata_cache_reads_once_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir);
        let mut cache = MetadataCache::new();

        assert_eq!(cache.get(&image).rating, 0);
        set_rating(&image, 5).unwrap();
        assert_eq!(cache.get(&image).rating, 0);

        cache.invalidate(&image);
        assert_eq!(cache.get(&image).rating, 5);
    }
}
