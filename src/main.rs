use iced::widget::image::Handle;
use iced::widget::{
    button, checkbox, column, container, pick_list, row, scrollable, slider, text, text_input,
    Column, Row,
};
use iced::keyboard::{self, key, Key, Modifiers};
use iced::{window, Alignment, Element, Length, Size, Subscription, Task, Theme};
use rfd::FileDialog;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use photo_gallery::cache::{ThumbnailCache, ThumbnailEvent, ThumbnailWorker};
use photo_gallery::fileops;
use photo_gallery::gallery::{self, FilterMethod, GalleryState, GalleryView, SortMethod};
use photo_gallery::scanner::{self, ScanMode, ScanResult};
use photo_gallery::state::data::human_readable_size;
use photo_gallery::state::edit::EditParams;
use photo_gallery::state::metadata::{self, ImageMetadata, LabelColor, MetadataCache};
use photo_gallery::state::settings::Settings;
use photo_gallery::viewer::{self, FlipAxis, Rotation, Slideshow, Viewer};

/// How often the UI drains completion events from the thumbnail worker
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Main application state
struct PhotoGallery {
    settings: Settings,
    cache: ThumbnailCache,
    scan: ScanResult,
    worker: Option<ThumbnailWorker>,
    /// Bumped by every rescan; results of older scans are dropped
    scan_generation: u64,
    /// Source path -> thumbnail, filled incrementally by the worker.
    /// This is what the grid draws; the disk is not consulted per frame.
    thumbnails: HashMap<PathBuf, Handle>,
    gallery: GalleryState,
    metadata: MetadataCache,
    /// Image tiles of the open folder, after sort/filter/search
    visible: Vec<(PathBuf, ImageMetadata)>,
    viewer: Option<Viewer>,
    viewer_handle: Option<Handle>,
    /// Sidecar metadata of the image in the viewer
    viewer_meta: ImageMetadata,
    slideshow: Slideshow,
    tag_input: String,
    /// Image waiting to be pasted into another folder
    clipboard_cut: Option<PathBuf>,
    window_width: f32,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    Rescan,
    ScanComplete(u64, ScanResult),
    ScanModeSelected(ScanMode),
    PollWorker,
    ThumbnailRegenerated(PathBuf, Result<Vec<u8>, String>),
    AddFolder,
    RemoveFolder(PathBuf),
    ClearCache,
    CacheCleared(Result<(), String>),
    OpenFolder(PathBuf),
    ShowFolders,
    SortSelected(SortMethod),
    FilterSelected(FilterMethod),
    SearchChanged(String),
    ToggleSelected(PathBuf),
    SelectAll,
    DeselectAll,
    RateSelected(u8),
    LabelSelected(Option<LabelColor>),
    TrashSelected,
    DeletePressed,
    Cut(PathBuf),
    Paste(PathBuf),
    OpenImage(PathBuf),
    ImageLoaded(PathBuf, Result<::image::DynamicImage, String>),
    NextImage,
    PreviousImage,
    CloseViewer,
    ZoomIn,
    ZoomOut,
    FitToWindow,
    Rotate(i32),
    Flip(FlipAxis),
    SaveTransform,
    DiscardTransform,
    Brightness(i32),
    Contrast(f32),
    Saturation(f32),
    SaveEdits,
    ResetEdits,
    SetRating(u8),
    SetLabel(Option<LabelColor>),
    TagInputChanged(String),
    AddTag,
    RemoveTag(String),
    ToggleSlideshow,
    TrashCurrent,
    WindowEvent(window::Event),
}

impl PhotoGallery {
    /// Create a new instance of the application
    fn new(settings: Settings, cache: ThumbnailCache) -> (Self, Task<Message>) {
        let gallery = GalleryState::new(settings.sort_method(), settings.filter_method());
        let window_width = settings.window_geometry().width as f32;

        let app = PhotoGallery {
            settings,
            cache,
            scan: ScanResult::default(),
            worker: None,
            scan_generation: 0,
            thumbnails: HashMap::new(),
            gallery,
            metadata: MetadataCache::new(),
            visible: Vec::new(),
            viewer: None,
            viewer_handle: None,
            viewer_meta: ImageMetadata::default(),
            slideshow: Slideshow::default(),
            tag_input: String::new(),
            clipboard_cut: None,
            window_width,
            status: "Ready".to_string(),
        };

        (app, Task::done(Message::Rescan))
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Rescan => {
                self.scan_generation += 1;
                let generation = self.scan_generation;
                // The running worker is stopped and joined by the scan task,
                // off the UI thread, before the next batch can start
                let previous = self.worker.take();

                let folders = self.settings.gallery_folders();
                self.status = "Scanning folders...".to_string();
                return Task::perform(
                    scan_async(previous, folders, self.settings.scan_mode()),
                    move |scan| Message::ScanComplete(generation, scan),
                );
            }
            Message::ScanComplete(generation, scan) => {
                if generation != self.scan_generation {
                    log::debug!("Dropping results of superseded scan {}", generation);
                    return Task::none();
                }
                // Only the latest scan spawns a worker, so there is none to replace
                if let Some(stale) = self.worker.take() {
                    stale.stop();
                }
                self.status = if self.settings.gallery_folders().is_empty() {
                    "No folders selected. Use \"Add Folder\" to add one.".to_string()
                } else {
                    format!("{}. Generating thumbnails in background...", scan.summary())
                };
                self.scan = scan;
                let images = self.scan.all_images();
                let present: HashSet<&PathBuf> = images.iter().collect();
                self.thumbnails.retain(|path, _| present.contains(path));
                self.metadata.clear();
                self.gallery.show_folders();
                self.refresh_visible();

                match ThumbnailWorker::spawn(self.cache.clone(), images) {
                    Ok(worker) => self.worker = Some(worker),
                    Err(e) => self.status = format!("Could not start thumbnail worker: {}", e),
                }
            }
            Message::PollWorker => {
                let Some(worker) = &self.worker else {
                    return Task::none();
                };

                let mut finished = false;
                for event in worker.try_events() {
                    match event {
                        ThumbnailEvent::Ready { source, thumbnail, .. } => {
                            self.thumbnails.insert(source, Handle::from_path(thumbnail));
                        }
                        ThumbnailEvent::Failed { .. } => {}
                        ThumbnailEvent::Finished(summary) => {
                            finished = true;
                            self.status = format!(
                                "{}. {} new thumbnails, {} failed.",
                                self.scan.summary(),
                                summary.generated,
                                summary.failed
                            );
                        }
                    }
                }
                if finished {
                    self.worker = None;
                }
            }
            Message::ThumbnailRegenerated(source, result) => match result {
                // Fresh bytes, so the image widget does not reuse pixels cached for the old file
                Ok(bytes) => {
                    self.thumbnails.insert(source, Handle::from_bytes(bytes));
                }
                Err(e) => log::warn!("Could not regenerate thumbnail of {}: {}", source.display(), e),
            },
            Message::ScanModeSelected(mode) => {
                if let Err(e) = self.settings.set_scan_mode(mode) {
                    log::warn!("Could not save scan mode: {}", e);
                }
                return Task::done(Message::Rescan);
            }
            Message::AddFolder => {
                // Show the native folder picker dialog
                let folder = FileDialog::new()
                    .set_title("Select Folder with Photos")
                    .pick_folder();

                if let Some(folder_path) = folder {
                    match self.settings.add_folder(&folder_path) {
                        Ok(true) => return Task::done(Message::Rescan),
                        Ok(false) => self.status = "Folder is already in the gallery.".to_string(),
                        Err(e) => self.status = format!("Could not save folder: {}", e),
                    }
                }
            }
            Message::RemoveFolder(folder) => match self.settings.remove_folder(&folder) {
                Ok(_) => return Task::done(Message::Rescan),
                Err(e) => self.status = format!("Could not remove folder: {}", e),
            },
            Message::ClearCache => {
                // Invalidate any scan in flight; its worker would refill the cache
                self.scan_generation += 1;
                self.thumbnails.clear();
                self.status = "Clearing thumbnail cache...".to_string();
                return Task::perform(
                    clear_cache_async(self.worker.take(), self.cache.clone()),
                    Message::CacheCleared,
                );
            }
            Message::CacheCleared(result) => match result {
                Ok(()) => {
                    self.status = "Thumbnail cache cleared.".to_string();
                    return Task::done(Message::Rescan);
                }
                Err(e) => self.status = format!("Failed to clear cache: {}", e),
            },
            Message::OpenFolder(folder) => {
                self.gallery.open_folder(&folder);
                self.refresh_visible();
            }
            Message::ShowFolders => {
                self.gallery.show_folders();
                self.refresh_visible();
            }
            Message::SortSelected(method) => {
                self.gallery.sort = method;
                if let Err(e) = self.settings.set_sort_method(method) {
                    log::warn!("Could not save sort method: {}", e);
                }
                self.refresh_visible();
            }
            Message::FilterSelected(method) => {
                self.gallery.filter = method;
                if let Err(e) = self.settings.set_filter_method(method) {
                    log::warn!("Could not save filter method: {}", e);
                }
                self.refresh_visible();
            }
            Message::SearchChanged(term) => {
                self.gallery.search = term;
                self.refresh_visible();
            }
            Message::ToggleSelected(path) => {
                self.gallery.selection.toggle(&path);
                self.status = self.gallery.selection.status_text();
            }
            Message::SelectAll => {
                let paths: Vec<PathBuf> = self.visible.iter().map(|(p, _)| p.clone()).collect();
                self.gallery.selection.select_all(&paths);
                self.status = self.gallery.selection.status_text();
            }
            Message::DeselectAll => {
                self.gallery.selection.clear();
                self.status = self.gallery.selection.status_text();
            }
            Message::RateSelected(rating) => {
                let paths = self.gallery.selection.paths();
                for path in &paths {
                    self.write_metadata(path, |p| metadata::set_rating(p, rating));
                }
                self.status = format!("Set rating for {} item(s).", paths.len());
                self.refresh_visible();
            }
            Message::LabelSelected(color) => {
                let paths = self.gallery.selection.paths();
                for path in &paths {
                    self.write_metadata(path, |p| metadata::set_label(p, color));
                }
                self.status = format!("Set label for {} item(s).", paths.len());
                self.refresh_visible();
            }
            Message::TrashSelected => {
                let paths = self.gallery.selection.paths();
                let trashed = fileops::trash_images(&paths, &self.cache);
                for path in &trashed {
                    self.thumbnails.remove(path);
                }
                self.status = format!("Moved {} item(s) to Trash.", trashed.len());
                return Task::done(Message::Rescan);
            }
            Message::DeletePressed => {
                if self.viewer.is_some() {
                    return Task::done(Message::TrashCurrent);
                }
                if !self.gallery.selection.is_empty() {
                    return Task::done(Message::TrashSelected);
                }
            }
            Message::Cut(path) => {
                self.status = format!(
                    "Cut {}. Use \"Paste\" on a folder to move it.",
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
                self.clipboard_cut = Some(path);
            }
            Message::Paste(folder) => {
                let Some(source) = self.clipboard_cut.take() else {
                    self.status = "Nothing to paste.".to_string();
                    return Task::none();
                };
                match fileops::move_image(&source, &folder, &self.cache) {
                    Ok(dest) => {
                        self.thumbnails.remove(&source);
                        self.status = format!("Moved to {}", dest.display());
                        return Task::done(Message::Rescan);
                    }
                    Err(e) => {
                        self.status = format!("Could not move {}: {}", source.display(), e);
                    }
                }
            }
            Message::OpenImage(path) => {
                let images: Vec<PathBuf> = self.visible.iter().map(|(p, _)| p.clone()).collect();
                self.viewer = Viewer::new(images, &path);
                return self.load_current_image();
            }
            Message::ImageLoaded(path, result) => {
                let Some(viewer) = &mut self.viewer else {
                    return Task::none();
                };
                // Ignore results for images we already navigated away from
                if viewer.current_path() != path {
                    return Task::none();
                }
                match result {
                    Ok(image) => {
                        viewer.set_image(image);
                        viewer.fit_to_window((self.window_width, self.window_width * 0.6));
                        let info = viewer.file_info();
                        self.viewer_meta = self.metadata.get(&path).clone();
                        self.refresh_viewer_handle();
                        self.status = match info {
                            Ok(info) => format!(
                                "{}  |  {}  |  {}  |  modified {}",
                                info.file_name,
                                info.dimensions
                                    .map(|(w, h)| format!("{} x {}", w, h))
                                    .unwrap_or_else(|| "unknown size".to_string()),
                                info.size_label(),
                                info.modified.format("%Y-%m-%d %H:%M")
                            ),
                            Err(e) => format!("Could not read file info: {}", e),
                        };
                    }
                    Err(e) => self.status = format!("Could not open {}: {}", path.display(), e),
                }
            }
            Message::NextImage => {
                if let Some(viewer) = &mut self.viewer {
                    if viewer.next().is_some() {
                        return self.load_current_image();
                    }
                }
            }
            Message::PreviousImage => {
                if let Some(viewer) = &mut self.viewer {
                    if viewer.previous().is_some() {
                        return self.load_current_image();
                    }
                }
            }
            Message::CloseViewer => {
                self.close_viewer();
                self.refresh_visible();
            }
            Message::ZoomIn => self.with_viewer(Viewer::zoom_in),
            Message::ZoomOut => self.with_viewer(Viewer::zoom_out),
            Message::FitToWindow => {
                let viewport = (self.window_width, self.window_width * 0.6);
                self.with_viewer(|v| v.fit_to_window(viewport));
            }
            Message::Rotate(degrees) => {
                if let Some(rotation) = Rotation::from_degrees(degrees) {
                    self.with_viewer(|v| v.rotate(rotation));
                }
            }
            Message::Flip(axis) => self.with_viewer(|v| v.flip(axis)),
            Message::SaveTransform => {
                if let Some(viewer) = &mut self.viewer {
                    let path = viewer.current_path().to_path_buf();
                    match viewer.save_overwrite(&self.cache) {
                        Ok(()) => {
                            self.status = format!("Saved changes to {}", path.display());
                            // The old tile is stale; show a placeholder until the new one exists
                            self.thumbnails.remove(&path);
                            return Task::perform(
                                regenerate_thumbnail(self.cache.clone(), path.clone()),
                                move |result| Message::ThumbnailRegenerated(path.clone(), result),
                            );
                        }
                        Err(e) => self.status = format!("Could not save changes to file: {}", e),
                    }
                }
            }
            Message::DiscardTransform => {
                if let Some(viewer) = &mut self.viewer {
                    if let Err(e) = viewer.discard_transform() {
                        self.status = format!("Could not reload image: {}", e);
                    }
                }
                self.refresh_viewer_handle();
            }
            Message::Brightness(value) => {
                self.adjust(|edits| edits.brightness = value);
            }
            Message::Contrast(value) => {
                self.adjust(|edits| edits.contrast = value);
            }
            Message::Saturation(value) => {
                self.adjust(|edits| edits.saturation = value);
            }
            Message::SaveEdits => {
                if let Some(viewer) = &self.viewer {
                    let path = viewer.current_path().to_path_buf();
                    match viewer.save_edits() {
                        Ok(meta) => {
                            self.viewer_meta = meta.clone();
                            self.metadata.put(&path, meta);
                            self.status = "Adjustments saved.".to_string();
                        }
                        Err(e) => self.status = format!("Could not save adjustments: {}", e),
                    }
                }
            }
            Message::ResetEdits => {
                if let Some(viewer) = &mut self.viewer {
                    let path = viewer.current_path().to_path_buf();
                    match viewer.reset_edits() {
                        Ok(meta) => {
                            self.viewer_meta = meta.clone();
                            self.metadata.put(&path, meta);
                            self.status = "Adjustments have been reset.".to_string();
                        }
                        Err(e) => self.status = format!("Could not reset adjustments: {}", e),
                    }
                }
                self.refresh_viewer_handle();
            }
            Message::SetRating(rating) => {
                if let Some(path) = self.current_image() {
                    self.write_metadata(&path, |p| metadata::set_rating(p, rating));
                }
            }
            Message::SetLabel(color) => {
                if let Some(path) = self.current_image() {
                    self.write_metadata(&path, |p| metadata::set_label(p, color));
                }
            }
            Message::TagInputChanged(value) => self.tag_input = value,
            Message::AddTag => {
                if let Some(path) = self.current_image() {
                    let tag = std::mem::take(&mut self.tag_input);
                    self.write_metadata(&path, |p| metadata::add_tag(p, &tag));
                }
            }
            Message::RemoveTag(tag) => {
                if let Some(path) = self.current_image() {
                    self.write_metadata(&path, |p| metadata::remove_tag(p, &tag));
                }
            }
            Message::ToggleSlideshow => {
                let count = self.viewer.as_ref().map(Viewer::len).unwrap_or(0);
                self.status = if self.slideshow.toggle(count) {
                    "Slideshow running (3s interval)...".to_string()
                } else if count > 1 {
                    "Slideshow stopped.".to_string()
                } else {
                    "Not enough images for a slideshow.".to_string()
                };
            }
            Message::TrashCurrent => {
                if let Some(viewer) = &mut self.viewer {
                    let path = viewer.current_path().to_path_buf();
                    if let Err(e) = fileops::trash_image(&path, &self.cache) {
                        self.status = format!("Failed to delete {}: {}", path.display(), e);
                        return Task::none();
                    }
                    self.thumbnails.remove(&path);
                    self.status = format!("Moved {} to Trash.", path.display());
                    if viewer.remove_current() {
                        return self.load_current_image();
                    }
                    // That was the last image: leave the viewer right away
                    self.close_viewer();
                    return Task::done(Message::Rescan);
                }
            }
            Message::WindowEvent(event) => {
                let geometry = self.settings.window_geometry();
                let geometry = match event {
                    window::Event::Resized(size) => {
                        self.window_width = size.width;
                        geometry.resized_to(size.width, size.height)
                    }
                    window::Event::Moved(position) => geometry.moved_to(position.x, position.y),
                    _ => return Task::none(),
                };
                if let Err(e) = self.settings.set_window_geometry(geometry) {
                    log::warn!("Could not save window geometry: {}", e);
                }
            }
        }

        Task::none()
    }

    fn close_viewer(&mut self) {
        self.slideshow.stop();
        self.viewer = None;
        self.viewer_handle = None;
    }

    fn with_viewer(&mut self, f: impl FnOnce(&mut Viewer)) {
        if let Some(viewer) = &mut self.viewer {
            f(viewer);
            self.refresh_viewer_handle();
        }
    }

    fn adjust(&mut self, f: impl FnOnce(&mut EditParams)) {
        self.with_viewer(|viewer| {
            let mut edits = viewer.edits();
            f(&mut edits);
            viewer.set_edits(edits);
        });
    }

    fn current_image(&self) -> Option<PathBuf> {
        self.viewer.as_ref().map(|v| v.current_path().to_path_buf())
    }

    fn write_metadata(
        &mut self,
        path: &Path,
        write: impl FnOnce(&Path) -> photo_gallery::Result<ImageMetadata>,
    ) {
        match write(path) {
            Ok(meta) => {
                if self.current_image().as_deref() == Some(path) {
                    self.viewer_meta = meta.clone();
                }
                self.metadata.put(path, meta);
            }
            Err(e) => {
                log::warn!("Could not update metadata of {}: {}", path.display(), e);
                self.status = format!("Could not update metadata: {}", e);
            }
        }
    }

    fn load_current_image(&mut self) -> Task<Message> {
        self.viewer_handle = None;
        match &self.viewer {
            Some(viewer) => {
                let path = viewer.current_path().to_path_buf();
                Task::perform(viewer::load_image(path.clone()), move |result| {
                    Message::ImageLoaded(path.clone(), result.map_err(|e| e.to_string()))
                })
            }
            None => Task::none(),
        }
    }

    fn refresh_viewer_handle(&mut self) {
        self.viewer_handle = self
            .viewer
            .as_ref()
            .and_then(Viewer::rendered)
            .map(|img| {
                let rgba = img.to_rgba8();
                Handle::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
            });
    }

    /// Recompute the image tiles of the open folder
    fn refresh_visible(&mut self) {
        self.visible.clear();
        let Some(folder) = self.gallery.current_folder().and_then(|p| self.scan.folder(p)) else {
            return;
        };

        let paths = gallery::visible_images(
            folder,
            self.gallery.sort,
            self.gallery.filter,
            &self.gallery.search,
            &mut self.metadata,
        );
        self.visible = paths
            .into_iter()
            .map(|p| {
                let meta = self.metadata.get(&p).clone();
                (p, meta)
            })
            .collect();
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body = match &self.viewer {
            Some(viewer) => self.view_viewer(viewer),
            None => self.view_gallery(),
        };

        column![body, text(&self.status).size(14)]
            .spacing(8)
            .padding(10)
            .into()
    }

    fn view_gallery(&self) -> Element<Message> {
        let mut toolbar = row![
            button("Add Folder").on_press(Message::AddFolder),
            button("Refresh").on_press(Message::Rescan),
            button("Clear Cache").on_press(Message::ClearCache),
            pick_list(
                ScanMode::ALL,
                Some(self.settings.scan_mode()),
                Message::ScanModeSelected
            ),
            pick_list(SortMethod::ALL, Some(self.gallery.sort), Message::SortSelected),
            text_input("Search...", &self.gallery.search).on_input(Message::SearchChanged),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let columns = gallery::grid_columns(self.window_width);

        let tiles: Vec<Element<Message>> = match &self.gallery.view {
            GalleryView::Folders => {
                gallery::visible_folders(&self.scan, self.gallery.sort, &self.gallery.search)
                    .into_iter()
                    .map(|folder| {
                        let previews = Row::with_children(
                            folder.preview_images().iter().map(|p| self.thumbnail(p, 50.0)),
                        )
                        .spacing(2);
                        let tile = column![
                            previews,
                            text(format!("{}\n({} items)", folder.name(), folder.len())),
                        ]
                        .spacing(4)
                        .width(220);
                        let mut actions = row![button(text("Remove").size(12))
                            .on_press(Message::RemoveFolder(folder.path.clone()))]
                        .spacing(4);
                        if self.clipboard_cut.is_some() {
                            actions = actions.push(
                                button(text("Paste").size(12))
                                    .on_press(Message::Paste(folder.path.clone())),
                            );
                        }
                        column![
                            button(tile).on_press(Message::OpenFolder(folder.path.clone())),
                            actions,
                        ]
                        .into()
                    })
                    .collect()
            }
            GalleryView::Images(_) => {
                toolbar = toolbar
                    .push(button("Back").on_press(Message::ShowFolders))
                    .push(pick_list(
                        FilterMethod::all(),
                        Some(self.gallery.filter),
                        Message::FilterSelected,
                    ))
                    .push(button("Select All").on_press(Message::SelectAll))
                    .push(button("Deselect").on_press(Message::DeselectAll));

                self.visible
                    .iter()
                    .map(|(path, meta)| {
                        let name = path
                            .file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .to_string();
                        let toggled = path.clone();
                        let label = meta
                            .label_color
                            .map(|c| format!(" [{}]", c))
                            .unwrap_or_default();
                        column![
                            button(self.thumbnail(path, 124.0))
                                .on_press(Message::OpenImage(path.clone())),
                            text(name).size(12),
                            row![
                                checkbox("", self.gallery.selection.contains(path))
                                    .on_toggle(move |_| Message::ToggleSelected(toggled.clone())),
                                text(format!("{}{}", meta.stars(), label)).size(12),
                                button(text("Cut").size(12)).on_press(Message::Cut(path.clone())),
                            ]
                            .spacing(4),
                        ]
                        .width(220)
                        .into()
                    })
                    .collect()
            }
        };

        let mut grid = Column::new().spacing(10);
        let mut tiles = tiles.into_iter().peekable();
        while tiles.peek().is_some() {
            grid = grid.push(Row::with_children(tiles.by_ref().take(columns)).spacing(10));
        }

        let mut content = column![toolbar].spacing(10);
        if !self.gallery.selection.is_empty() {
            let mut actions = row![text(self.gallery.selection.status_text())].spacing(6);
            for rating in 0..=metadata::MAX_RATING {
                actions = actions.push(
                    button(text(format!("{}★", rating)).size(12))
                        .on_press(Message::RateSelected(rating)),
                );
            }
            for color in LabelColor::ALL {
                actions = actions.push(
                    button(text(color.to_string()).size(12))
                        .on_press(Message::LabelSelected(Some(color))),
                );
            }
            actions = actions
                .push(button(text("no label").size(12)).on_press(Message::LabelSelected(None)))
                .push(button("Move to Trash").on_press(Message::TrashSelected));
            content = content.push(actions);
        }

        content
            .push(scrollable(grid).height(Length::Fill))
            .into()
    }

    fn view_viewer<'a>(&'a self, viewer: &'a Viewer) -> Element<'a, Message> {
        let navigation = row![
            button("Back").on_press(Message::CloseViewer),
            button("<").on_press(Message::PreviousImage),
            button(">").on_press(Message::NextImage),
            button("-").on_press(Message::ZoomOut),
            text(format!("{}%", viewer.zoom())),
            button("+").on_press(Message::ZoomIn),
            button("Fit").on_press(Message::FitToWindow),
            button("⟲").on_press(Message::Rotate(-90)),
            button("⟳").on_press(Message::Rotate(90)),
            button("Flip H").on_press(Message::Flip(FlipAxis::Horizontal)),
            button("Flip V").on_press(Message::Flip(FlipAxis::Vertical)),
            button(if self.slideshow.is_running() { "Pause" } else { "Slideshow" })
                .on_press(Message::ToggleSlideshow),
            button("Trash").on_press(Message::TrashCurrent),
        ]
        .spacing(6)
        .align_y(Alignment::Center);

        let mut navigation = Column::new().push(navigation);
        if viewer.has_unsaved_transform() {
            navigation = navigation.push(
                row![
                    text("Overwrite the original file with the current rotation/flip?"),
                    button("Save").on_press(Message::SaveTransform),
                    button("Discard").on_press(Message::DiscardTransform),
                ]
                .spacing(6),
            );
        }

        let picture: Element<Message> = match (&self.viewer_handle, viewer.scaled_size()) {
            (Some(handle), Some((w, h))) => iced::widget::image(handle.clone())
                .width(Length::Fixed(w))
                .height(Length::Fixed(h))
                .into(),
            _ => text("Loading...").into(),
        };

        let edits = viewer.edits();
        let meta = &self.viewer_meta;

        let mut stars = Row::new().spacing(2);
        for rating in 0..=metadata::MAX_RATING {
            let glyph = match rating {
                0 => "✕",
                r if r <= meta.rating => "★",
                _ => "☆",
            };
            stars = stars.push(button(text(glyph)).on_press(Message::SetRating(rating)));
        }

        let mut labels = Row::new().spacing(2);
        for color in LabelColor::ALL {
            labels = labels.push(
                button(text(color.to_string()).size(12)).on_press(Message::SetLabel(Some(color))),
            );
        }
        labels = labels.push(button(text("none").size(12)).on_press(Message::SetLabel(None)));

        let mut tags = Row::new().spacing(4);
        for tag in &meta.tags {
            tags = tags.push(
                button(text(format!("{} x", tag)).size(12)).on_press(Message::RemoveTag(tag.clone())),
            );
        }

        let panel = column![
            text("Adjustments"),
            text(format!("Brightness {}", edits.brightness)),
            slider(-100..=100, edits.brightness, Message::Brightness),
            text(format!("Contrast {:.2}", edits.contrast)),
            slider(0.0..=3.0, edits.contrast, Message::Contrast).step(0.01f32),
            text(format!("Saturation {:.2}", edits.saturation)),
            slider(0.0..=3.0, edits.saturation, Message::Saturation).step(0.01f32),
            row![
                button("Save").on_press(Message::SaveEdits),
                button("Reset").on_press(Message::ResetEdits),
            ]
            .spacing(6),
            text("Rating"),
            stars,
            text("Label"),
            labels,
            text("Tags"),
            tags,
            row![
                text_input("Add tag...", &self.tag_input)
                    .on_input(Message::TagInputChanged)
                    .on_submit(Message::AddTag),
                button("Add").on_press(Message::AddTag),
            ]
            .spacing(6),
        ]
        .spacing(6)
        .width(260);

        column![
            navigation,
            row![
                container(scrollable(picture))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .center_x(Length::Fill),
                panel,
            ]
            .spacing(10),
        ]
        .spacing(8)
        .into()
    }

    /// Cached thumbnail, or a placeholder while the worker has not reached it
    fn thumbnail(&self, source: &Path, height: f32) -> Element<Message> {
        match self.thumbnails.get(source) {
            Some(handle) => iced::widget::image(handle.clone())
                .height(Length::Fixed(height))
                .into(),
            None => container(text("..."))
                .height(Length::Fixed(height))
                .center_y(Length::Fixed(height))
                .into(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            window::events().map(|(_id, event)| Message::WindowEvent(event)),
            keyboard::on_key_press(key_to_message),
        ];

        if self.worker.is_some() {
            subscriptions.push(iced::time::every(WORKER_POLL_INTERVAL).map(|_| Message::PollWorker));
        }
        if self.slideshow.is_running() {
            subscriptions.push(iced::time::every(self.slideshow.interval).map(|_| Message::NextImage));
        }

        Subscription::batch(subscriptions)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Keyboard shortcuts. Keys consumed by a focused text input never get here.
fn key_to_message(key: Key, modifiers: Modifiers) -> Option<Message> {
    match key.as_ref() {
        Key::Named(key::Named::ArrowLeft) => Some(Message::PreviousImage),
        Key::Named(key::Named::ArrowRight) => Some(Message::NextImage),
        Key::Named(key::Named::Escape) => Some(Message::CloseViewer),
        Key::Named(key::Named::Delete) => Some(Message::DeletePressed),
        Key::Character("a") if modifiers.command() => Some(Message::SelectAll),
        _ => None,
    }
}

/// Stop and join a worker on a blocking thread
async fn retire_worker(worker: Option<ThumbnailWorker>) {
    if let Some(worker) = worker {
        worker.stop();
        if let Err(e) = tokio::task::spawn_blocking(move || drop(worker)).await {
            log::error!("Worker shutdown failed: {}", e);
        }
    }
}

/// Scan on a blocking thread so the window keeps repainting.
/// The previous worker is joined first, so two batches never overlap.
async fn scan_async(
    previous: Option<ThumbnailWorker>,
    folders: Vec<PathBuf>,
    mode: ScanMode,
) -> ScanResult {
    retire_worker(previous).await;
    tokio::task::spawn_blocking(move || scanner::scan_folders(&folders, mode))
        .await
        .unwrap_or_else(|e| {
            log::error!("Scan task failed: {}", e);
            ScanResult::default()
        })
}

async fn clear_cache_async(
    worker: Option<ThumbnailWorker>,
    cache: ThumbnailCache,
) -> Result<(), String> {
    retire_worker(worker).await;
    tokio::task::spawn_blocking(move || cache.clear())
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// Rebuild one cache entry and read it back for display
async fn regenerate_thumbnail(cache: ThumbnailCache, source: PathBuf) -> Result<Vec<u8>, String> {
    tokio::task::spawn_blocking(move || {
        let entry = cache.generate(&source)?;
        Ok::<_, photo_gallery::GalleryError>(std::fs::read(entry)?)
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())
}

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::open_default() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Falling back to in-memory settings: {}", e);
            match Settings::open_in_memory() {
                Ok(settings) => settings,
                Err(e) => {
                    log::error!("Settings store unavailable: {}", e);
                    return Ok(());
                }
            }
        }
    };

    let cache = match ThumbnailCache::open_default() {
        Ok(cache) => cache,
        Err(e) => {
            log::error!("Thumbnail cache unavailable: {}", e);
            return Ok(());
        }
    };
    match cache.stats() {
        Ok(stats) => log::info!(
            "Thumbnail cache at {}: {} files, {}",
            cache.dir().display(),
            stats.file_count,
            human_readable_size(stats.total_bytes)
        ),
        Err(e) => log::warn!("Could not read cache info: {}", e),
    }

    let geometry = settings.window_geometry();

    iced::application("Photo Gallery", PhotoGallery::update, PhotoGallery::view)
        .theme(PhotoGallery::theme)
        .subscription(PhotoGallery::subscription)
        .window(window::Settings {
            size: Size::new(geometry.width as f32, geometry.height as f32),
            position: window::Position::Specific(iced::Point::new(
                geometry.x as f32,
                geometry.y as f32,
            )),
            ..window::Settings::default()
        })
        .run_with(move || PhotoGallery::new(settings, cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_shortcuts() {
        let none = Modifiers::empty();
        let named = |k| key_to_message(Key::Named(k), none);

        assert!(matches!(named(key::Named::ArrowLeft), Some(Message::PreviousImage)));
        assert!(matches!(named(key::Named::ArrowRight), Some(Message::NextImage)));
        assert!(matches!(named(key::Named::Escape), Some(Message::CloseViewer)));
        assert!(matches!(named(key::Named::Delete), Some(Message::DeletePressed)));
        assert!(named(key::Named::Tab).is_none());

        assert!(matches!(
            key_to_message(Key::Character("a".into()), Modifiers::COMMAND),
            Some(Message::SelectAll)
        ));
        assert!(key_to_message(Key::Character("a".into()), none).is_none());
    }
}
