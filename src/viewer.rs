/// Single-image viewer state
///
/// Holds the decoded image being viewed, its position in the current
/// (sorted, filtered) image list, zoom/pan, destructive edits
/// (rotate/flip, written back to the source file) and non-destructive
/// adjustments (saved to the sidecar).

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

use crate::cache::ThumbnailCache;
use crate::error::{GalleryError, Result};
use crate::state::data::FileInfo;
use crate::state::edit::EditParams;
use crate::state::metadata::{self, ImageMetadata};

pub const MIN_ZOOM: u32 = 10;
pub const MAX_ZOOM: u32 = 400;
pub const ZOOM_STEP: u32 = 10;

/// Quality used when a rotation/flip is written back to a JPEG source
pub const OVERWRITE_JPEG_QUALITY: u8 = 95;

pub const SLIDESHOW_INTERVAL: Duration = Duration::from_secs(3);

/// Load a full-resolution image off the async runtime's worker threads
pub async fn load_image(path: PathBuf) -> Result<DynamicImage> {
    // Spawn blocking because decoding is CPU-intensive
    task::spawn_blocking(move || image::open(&path).map_err(GalleryError::from))
        .await
        .map_err(|e| GalleryError::Join(e.to_string()))?
}

/// Clockwise rotation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Map degrees (any multiple of 90, negative = counter-clockwise)
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Viewer over one image of a list
#[derive(Debug, Clone)]
pub struct Viewer {
    images: Vec<PathBuf>,
    index: usize,
    /// Decoded source, including unsaved rotations/flips
    original: Option<DynamicImage>,
    /// `original` with `edits` applied, what gets displayed
    rendered: Option<DynamicImage>,
    edits: EditParams,
    zoom: u32,
    pan: (f32, f32),
    unsaved_transform: bool,
}

impl Viewer {
    /// Open the viewer on `current`, which must be part of `images`
    pub fn new(images: Vec<PathBuf>, current: &Path) -> Option<Self> {
        let index = images.iter().position(|p| p == current)?;
        Some(Self {
            images,
            index,
            original: None,
            rendered: None,
            edits: EditParams::default(),
            zoom: 100,
            pan: (0.0, 0.0),
            unsaved_transform: false,
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.images[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Display the decoded image for the current path, restoring saved adjustments
    pub fn set_image(&mut self, image: DynamicImage) {
        self.edits = ImageMetadata::load(self.current_path()).edits_or_default();
        self.original = Some(image);
        self.unsaved_transform = false;
        self.pan = (0.0, 0.0);
        self.render();
    }

    /// Decode the current path synchronously and display it
    pub fn load_current(&mut self) -> Result<()> {
        let image = image::open(self.current_path())?;
        self.set_image(image);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.rendered.is_some()
    }

    /// The image to draw, adjustments applied
    pub fn rendered(&self) -> Option<&DynamicImage> {
        self.rendered.as_ref()
    }

    fn render(&mut self) {
        self.rendered = self.original.as_ref().map(|img| self.edits.apply(img));
    }

    fn go_to(&mut self, index: usize) -> Option<&Path> {
        if self.images.len() <= 1 {
            return None;
        }
        self.index = index;
        self.original = None;
        self.rendered = None;
        self.unsaved_transform = false;
        Some(self.current_path())
    }

    /// Advance with wrap-around. Returns the new path to load, None for lists of one.
    pub fn next(&mut self) -> Option<&Path> {
        let len = self.images.len().max(1);
        self.go_to((self.index + 1) % len)
    }

    pub fn previous(&mut self) -> Option<&Path> {
        let len = self.images.len().max(1);
        self.go_to((self.index + len - 1) % len)
    }

    /// Drop the current path from the list (e.g. after it was trashed).
    ///
    /// The list never becomes empty: for the last image this returns false,
    /// leaves the viewer untouched and the caller closes it.
    pub fn remove_current(&mut self) -> bool {
        if self.images.len() <= 1 {
            return false;
        }
        self.images.remove(self.index);
        self.original = None;
        self.rendered = None;
        if self.index >= self.images.len() {
            self.index = 0;
        }
        true
    }

    // ========== Zoom & Pan ==========

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, percent: u32) {
        self.zoom = percent.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = (0.0, 0.0);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_sub(ZOOM_STEP));
    }

    /// Zoom that fits the whole image in the viewport, never above 100%
    pub fn fit_zoom(&self, viewport: (f32, f32)) -> Option<u32> {
        let (w, h) = self.rendered.as_ref()?.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let scale = (viewport.0 / w as f32).min(viewport.1 / h as f32).min(1.0);
        Some(((scale * 100.0) as u32).clamp(MIN_ZOOM, MAX_ZOOM))
    }

    pub fn fit_to_window(&mut self, viewport: (f32, f32)) {
        if let Some(zoom) = self.fit_zoom(viewport) {
            self.set_zoom(zoom);
        }
    }

    /// Size of the image on screen at the current zoom
    pub fn scaled_size(&self) -> Option<(f32, f32)> {
        let (w, h) = self.rendered.as_ref()?.dimensions();
        let factor = self.zoom as f32 / 100.0;
        Some((w as f32 * factor, h as f32 * factor))
    }

    /// Whether dragging should pan (image larger than viewport)
    pub fn can_pan(&self, viewport: (f32, f32)) -> bool {
        self.scaled_size()
            .is_some_and(|(w, h)| w > viewport.0 || h > viewport.1)
    }

    /// Move the image by a drag delta; the image edge cannot pass the viewport edge
    pub fn pan_by(&mut self, delta: (f32, f32), viewport: (f32, f32)) {
        let Some((w, h)) = self.scaled_size() else {
            return;
        };
        let limit_x = ((w - viewport.0) / 2.0).max(0.0);
        let limit_y = ((h - viewport.1) / 2.0).max(0.0);
        self.pan = (
            (self.pan.0 + delta.0).clamp(-limit_x, limit_x),
            (self.pan.1 + delta.1).clamp(-limit_y, limit_y),
        );
    }

    pub fn pan(&self) -> (f32, f32) {
        self.pan
    }

    // ========== Destructive edits ==========

    pub fn rotate(&mut self, rotation: Rotation) {
        if let Some(img) = self.original.take() {
            self.original = Some(match rotation {
                Rotation::Cw90 => img.rotate90(),
                Rotation::Cw180 => img.rotate180(),
                Rotation::Cw270 => img.rotate270(),
            });
            self.unsaved_transform = true;
            self.render();
        }
    }

    pub fn flip(&mut self, axis: FlipAxis) {
        if let Some(img) = self.original.take() {
            self.original = Some(match axis {
                FlipAxis::Horizontal => img.fliph(),
                FlipAxis::Vertical => img.flipv(),
            });
            self.unsaved_transform = true;
            self.render();
        }
    }

    pub fn has_unsaved_transform(&self) -> bool {
        self.unsaved_transform
    }

    /// Write the rotated/flipped image over the source file.
    ///
    /// Adjustments are not baked in; they stay in the sidecar. The source's
    /// thumbnail is invalidated so the next scan regenerates it.
    pub fn save_overwrite(&mut self, cache: &ThumbnailCache) -> Result<()> {
        let path = self.current_path().to_path_buf();
        let img = self
            .original
            .as_ref()
            .ok_or_else(|| GalleryError::invalid("viewer state", "no image loaded"))?;

        overwrite_image(img, &path)?;
        cache.invalidate(&path)?;
        self.unsaved_transform = false;

        log::info!("Saved changes to {}", path.display());
        Ok(())
    }

    /// Throw away unsaved rotations/flips by decoding the source again
    pub fn discard_transform(&mut self) -> Result<()> {
        self.load_current()
    }

    // ========== Non-destructive adjustments ==========

    pub fn edits(&self) -> EditParams {
        self.edits
    }

    /// Preview new adjustments without saving them
    pub fn set_edits(&mut self, edits: EditParams) {
        self.edits = edits.clamped();
        self.render();
    }

    /// Persist the current adjustments to the sidecar
    pub fn save_edits(&self) -> Result<ImageMetadata> {
        metadata::save_edits(self.current_path(), self.edits)
    }

    /// Reset adjustments to neutral and remove them from the sidecar
    pub fn reset_edits(&mut self) -> Result<ImageMetadata> {
        self.edits.reset();
        self.render();
        metadata::reset_edits(self.current_path())
    }

    pub fn file_info(&self) -> Result<FileInfo> {
        FileInfo::read(self.current_path())
    }
}

/// Encode `img` into `path`, keeping the source's format
fn overwrite_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)?;
    let tmp = path.with_extension("saving");

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        if format == ImageFormat::Jpeg {
            let encoder = JpegEncoder::new_with_quality(&mut writer, OVERWRITE_JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        } else {
            img.write_to(&mut writer, format)?;
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Slideshow timer state; the UI ticks `next()` every `interval`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slideshow {
    pub interval: Duration,
    running: bool,
}

impl Default for Slideshow {
    fn default() -> Self {
        Self {
            interval: SLIDESHOW_INTERVAL,
            running: false,
        }
    }
}

impl Slideshow {
    /// Start if there is more than one image; returns whether it runs
    pub fn start(&mut self, image_count: usize) -> bool {
        self.running = image_count > 1;
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn toggle(&mut self, image_count: usize) -> bool {
        if self.running {
            self.stop();
            false
        } else {
            self.start(image_count)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
