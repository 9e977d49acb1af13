use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{GalleryError, Result};

/// Size of generated thumbnails (fills this box, then center-cropped)
pub const THUMBNAIL_WIDTH: u32 = 220;
pub const THUMBNAIL_HEIGHT: u32 = 124;

/// JPEG quality used for cache entries
pub const JPEG_QUALITY: u8 = 90;

/// Disk usage of the thumbnail cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Content-addressed thumbnail store.
///
/// Each source path maps to exactly one `<blake3(path)>.jpg` in the cache
/// directory. Entries are created lazily and only removed by `invalidate`
/// or a full `clear`.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    /// Use `dir` as the cache directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Get the thumbnail cache directory
    /// Returns ~/.cache/photo-gallery/thumbnails on Linux
    pub fn open_default() -> Result<Self> {
        let mut path = dirs_next::cache_dir()
            .or_else(dirs_next::home_dir)
            .ok_or(GalleryError::NoDirectory("cache"))?;

        path.push("photo-gallery");
        path.push("thumbnails");

        Self::new(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the entry path for a source image (doesn't generate, just returns the expected path)
    pub fn entry_path(&self, source: &Path) -> PathBuf {
        self.dir.join(format!("{}.jpg", cache_key(source)))
    }

    /// Existing entry for `source`, if one was generated
    pub fn lookup(&self, source: &Path) -> Option<PathBuf> {
        let path = self.entry_path(source);
        path.is_file().then_some(path)
    }

    /// Return the cached thumbnail for `source`, generating it first if absent.
    ///
    /// The second element is true when the entry already existed.
    pub fn get_or_generate(&self, source: &Path) -> Result<(PathBuf, bool)> {
        if let Some(existing) = self.lookup(source) {
            return Ok((existing, true));
        }
        self.generate(source).map(|path| (path, false))
    }

    /// Decode `source`, render the thumbnail and store it.
    ///
    /// An existing entry is left untouched. The JPEG is written to a temporary
    /// file and renamed into place, so readers never observe a partial entry.
    pub fn generate(&self, source: &Path) -> Result<PathBuf> {
        let entry = self.entry_path(source);
        if entry.is_file() {
            return Ok(entry);
        }

        let img = image::open(source)?;
        let thumbnail = render_thumbnail(&img);

        // Directory may have been cleared while we were decoding
        fs::create_dir_all(&self.dir)?;

        // Every writer gets its own temp file; concurrent writers of the
        // same key each rename a complete JPEG over the entry
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{}.", cache_key(source)))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        write_jpeg(&thumbnail, tmp.as_file_mut())?;
        tmp.persist(&entry).map_err(|e| GalleryError::Io(e.error))?;

        log::debug!("Generated thumbnail {} for {}", entry.display(), source.display());
        Ok(entry)
    }

    /// Remove the entry of one source, e.g. after the source was overwritten.
    /// Returns true if an entry existed.
    pub fn invalidate(&self, source: &Path) -> Result<bool> {
        match fs::remove_file(self.entry_path(source)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Count files and bytes in the cache directory
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                stats.file_count += 1;
                stats.total_bytes += meta.len();
            }
        }

        Ok(stats)
    }

    /// Delete every cached thumbnail. They are regenerated on the next scan.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir)?;
        log::info!("Cleared thumbnail cache at {}", self.dir.display());
        Ok(())
    }
}

/// Cache key of a source path: hex BLAKE3 of its string form
pub fn cache_key(source: &Path) -> String {
    blake3::hash(source.to_string_lossy().as_bytes())
        .to_hex()
        .to_string()
}

/// Resize to fill the thumbnail box, then crop the overflow symmetrically
pub fn render_thumbnail(img: &DynamicImage) -> DynamicImage {
    img.resize_to_fill(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, FilterType::Lanczos3)
}

fn write_jpeg(img: &DynamicImage, file: &mut fs::File) -> Result<()> {
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}
