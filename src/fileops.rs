use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::ThumbnailCache;
use crate::error::{GalleryError, Result};
use crate::state::metadata::sidecar_path;

/// Move an image and its sidecar to the OS trash and drop its thumbnail
pub fn trash_image(path: &Path, cache: &ThumbnailCache) -> Result<()> {
    discard_image(path, cache, |p| trash::delete(p).map_err(GalleryError::from))
}

/// Remove an image with `delete`, then its thumbnail and sidecar.
///
/// Only a failure on the image itself is an error: once the image is gone,
/// a sidecar that could not be removed is logged and left behind.
fn discard_image(
    path: &Path,
    cache: &ThumbnailCache,
    delete: impl Fn(&Path) -> Result<()>,
) -> Result<()> {
    delete(path)?;

    if let Err(e) = cache.invalidate(path) {
        log::warn!("Could not drop thumbnail of {}: {}", path.display(), e);
    }

    let meta = sidecar_path(path);
    if meta.exists() {
        if let Err(e) = delete(&meta) {
            log::warn!("Could not remove sidecar {}: {}", meta.display(), e);
        }
    }

    log::info!("Moved {} to trash", path.display());
    Ok(())
}

/// Trash several images; failures are logged and skipped.
/// Returns the paths that were trashed.
pub fn trash_images(paths: &[PathBuf], cache: &ThumbnailCache) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|path| match trash_image(path, cache) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete {}: {}", path.display(), e);
                false
            }
        })
        .cloned()
        .collect()
}

/// Move an image (and its sidecar) into `dest_folder`.
///
/// Returns the new path. Moving a file onto itself is a no-op; an existing
/// file at the destination is never overwritten. The thumbnail keyed by the
/// old path is dropped; the next scan creates one for the new path.
pub fn move_image(source: &Path, dest_folder: &Path, cache: &ThumbnailCache) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| GalleryError::invalid("image path", source.to_string_lossy()))?;
    let dest = dest_folder.join(file_name);

    if dest == source {
        return Ok(dest);
    }
    if dest.exists() {
        return Err(GalleryError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        )));
    }

    move_file(source, &dest)?;

    let meta_source = sidecar_path(source);
    if meta_source.exists() {
        move_file(&meta_source, &sidecar_path(&dest))?;
    }

    if let Err(e) = cache.invalidate(source) {
        log::warn!("Could not drop thumbnail of {}: {}", source.display(), e);
    }

    log::info!("Moved {} to {}", source.display(), dest_folder.display());
    Ok(dest)
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::metadata::{self, ImageMetadata};
    use image::{Rgb, RgbImage};

    fn test_cache() -> (tempfile::TempDir, ThumbnailCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path()).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_move_image_carries_sidecar() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let (_cache_dir, cache) = test_cache();
        let image = src.path().join("cat.png");
        RgbImage::from_pixel(30, 20, Rgb([1, 2, 3])).save(&image).unwrap();
        metadata::set_rating(&image, 4).unwrap();
        cache.generate(&image).unwrap();

        let moved = move_image(&image, dst.path(), &cache).unwrap();

        assert_eq!(moved, dst.path().join("cat.png"));
        assert!(!image.exists());
        assert!(!sidecar_path(&image).exists());
        assert_eq!(ImageMetadata::load(&moved).rating, 4);
        assert!(cache.lookup(&image).is_none());
    }

    #[test]
    fn test_discard_keeps_going_when_sidecar_fails() {
        let src = tempfile::tempdir().unwrap();
        let (_cache_dir, cache) = test_cache();
        let image = src.path().join("dog.png");
        RgbImage::from_pixel(30, 20, Rgb([1, 2, 3])).save(&image).unwrap();
        metadata::add_tag(&image, "pets").unwrap();
        cache.generate(&image).unwrap();

        let result = discard_image(&image, &cache, |p| {
            if p.to_string_lossy().ends_with(metadata::METADATA_SUFFIX) {
                Err(GalleryError::invalid("test deletion", p.to_string_lossy()))
            } else {
                fs::remove_file(p).map_err(GalleryError::from)
            }
        });

        assert!(result.is_ok());
        assert!(!image.exists());
        assert!(cache.lookup(&image).is_none());
        assert!(sidecar_path(&image).exists());
    }

    #[test]
    fn test_discard_reports_image_failure() {
        let src = tempfile::tempdir().unwrap();
        let (_cache_dir, cache) = test_cache();
        let image = src.path().join("missing.png");

        let result = discard_image(&image, &cache, |p| fs::remove_file(p).map_err(GalleryError::from));
        assert!(result.is_err());
    }

    #[test]
    fn test_move_onto_itself_is_noop() {
        let src = tempfile::tempdir().unwrap();
        let image = src.path().join("dog.png");
        fs::write(&image, b"png").unwrap();

        let (_cache_dir, cache) = test_cache();

        assert_eq!(move_image(&image, src.path(), &cache).unwrap(), image);
        assert!(image.exists());
    }

    #[test]
    fn test_move_refuses_to_overwrite() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let image = src.path().join("a.png");
        fs::write(&image, b"one").unwrap();
        fs::write(dst.path().join("a.png"), b"two").unwrap();

        let (_cache_dir, cache) = test_cache();

        assert!(move_image(&image, dst.path(), &cache).is_err());
        assert!(image.exists());
        assert_eq!(fs::read(dst.path().join("a.png")).unwrap(), b"two");
    }
}
