/// Gallery grid logic: sorting, filtering, searching and selection.
///
/// The UI layer only renders what these functions return.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::GalleryError;
use crate::scanner::ScanResult;
use crate::state::data::GalleryFolder;
use crate::state::metadata::{ImageMetadata, LabelColor, MetadataCache, MAX_RATING};

/// Width of one grid cell including spacing, in logical pixels
const GRID_CELL_WIDTH: f32 = 240.0;
/// Horizontal space reserved for the scrollbar and margins
const GRID_MARGIN: f32 = 30.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum SortMethod {
    #[default]
    NameAsc,
    NameDesc,
    DateNewest,
    DateOldest,
    SizeLargest,
    SizeSmallest,
}

impl SortMethod {
    pub const ALL: [SortMethod; 6] = [
        SortMethod::NameAsc,
        SortMethod::NameDesc,
        SortMethod::DateNewest,
        SortMethod::DateOldest,
        SortMethod::SizeLargest,
        SortMethod::SizeSmallest,
    ];

    /// Stable identifier used in the settings store
    pub fn id(&self) -> &'static str {
        match self {
            SortMethod::NameAsc => "name_asc",
            SortMethod::NameDesc => "name_desc",
            SortMethod::DateNewest => "date_new",
            SortMethod::DateOldest => "date_old",
            SortMethod::SizeLargest => "size_large",
            SortMethod::SizeSmallest => "size_small",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortMethod::NameAsc => "Name (A-Z)",
            SortMethod::NameDesc => "Name (Z-A)",
            SortMethod::DateNewest => "Date (Newest First)",
            SortMethod::DateOldest => "Date (Oldest First)",
            SortMethod::SizeLargest => "Size (Largest First)",
            SortMethod::SizeSmallest => "Size (Smallest First)",
        }
    }

    fn needs_file_stats(&self) -> bool {
        !matches!(self, SortMethod::NameAsc | SortMethod::NameDesc)
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortMethod {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMethod::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| GalleryError::invalid("sort method", s))
    }
}

impl TryFrom<String> for SortMethod {
    type Error = GalleryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortMethod> for String {
    fn from(method: SortMethod) -> Self {
        method.id().to_string()
    }
}

/// Which images the grid shows, based on sidecar metadata
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum FilterMethod {
    #[default]
    All,
    /// Exactly this many stars (0 = unrated)
    Rating(u8),
    /// This label, or no label for `None`
    Label(Option<LabelColor>),
}

impl FilterMethod {
    /// Every filter offered in the menu
    pub fn all() -> Vec<FilterMethod> {
        let mut filters = vec![FilterMethod::All];
        filters.extend((0..=MAX_RATING).map(FilterMethod::Rating));
        filters.extend(LabelColor::ALL.into_iter().map(|c| FilterMethod::Label(Some(c))));
        filters.push(FilterMethod::Label(None));
        filters
    }

    pub fn id(&self) -> String {
        match self {
            FilterMethod::All => "filter_all".to_string(),
            FilterMethod::Rating(n) => format!("filter_rating_{}", n),
            FilterMethod::Label(Some(color)) => format!("filter_color_{}", color),
            FilterMethod::Label(None) => "filter_color_none".to_string(),
        }
    }

    pub fn matches(&self, meta: &ImageMetadata) -> bool {
        match self {
            FilterMethod::All => true,
            FilterMethod::Rating(n) => meta.rating == *n,
            FilterMethod::Label(color) => meta.label_color == *color,
        }
    }
}

impl fmt::Display for FilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMethod::All => write!(f, "Show All"),
            FilterMethod::Rating(0) => write!(f, "No Rating"),
            FilterMethod::Rating(1) => write!(f, "★ 1 Star"),
            FilterMethod::Rating(n) => write!(f, "★ {} Stars", n),
            FilterMethod::Label(Some(color)) => {
                let name = color.as_str();
                write!(f, "{}{} Label", name[..1].to_uppercase(), &name[1..])
            }
            FilterMethod::Label(None) => write!(f, "No Label"),
        }
    }
}

impl FromStr for FilterMethod {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GalleryError::invalid("filter method", s);

        if s == "filter_all" {
            return Ok(FilterMethod::All);
        }
        if let Some(rating) = s.strip_prefix("filter_rating_") {
            let n: u8 = rating.parse().map_err(|_| invalid())?;
            if n > MAX_RATING {
                return Err(invalid());
            }
            return Ok(FilterMethod::Rating(n));
        }
        if let Some(color) = s.strip_prefix("filter_color_") {
            if color == "none" {
                return Ok(FilterMethod::Label(None));
            }
            let color: LabelColor = color.parse().map_err(|_| invalid())?;
            return Ok(FilterMethod::Label(Some(color)));
        }
        Err(invalid())
    }
}

impl TryFrom<String> for FilterMethod {
    type Error = GalleryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterMethod> for String {
    fn from(method: FilterMethod) -> Self {
        method.id()
    }
}

/// Sort image paths. Every mode is a total order: ties fall back to the path.
///
/// Date and size modes stat each file; files that vanished since the scan are dropped.
pub fn sort_images(paths: &[PathBuf], method: SortMethod) -> Vec<PathBuf> {
    if !method.needs_file_stats() {
        let mut sorted = paths.to_vec();
        sorted.sort();
        if method == SortMethod::NameDesc {
            sorted.reverse();
        }
        return sorted;
    }

    let mut keyed: Vec<(PathBuf, SystemTime, u64)> = paths
        .iter()
        .filter_map(|path| match fs::metadata(path) {
            Ok(meta) => {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((path.clone(), modified, meta.len()))
            }
            Err(e) => {
                log::warn!("Could not find {} during sorting: {}", path.display(), e);
                None
            }
        })
        .collect();

    keyed.sort_by(|(pa, ma, sa), (pb, mb, sb)| {
        let primary = match method {
            SortMethod::DateNewest => mb.cmp(ma),
            SortMethod::DateOldest => ma.cmp(mb),
            SortMethod::SizeLargest => sb.cmp(sa),
            SortMethod::SizeSmallest => sa.cmp(sb),
            SortMethod::NameAsc | SortMethod::NameDesc => Ordering::Equal,
        };
        primary.then_with(|| pa.cmp(pb))
    });

    keyed.into_iter().map(|(path, _, _)| path).collect()
}

/// Case-insensitive match of the search term against the file name or any tag.
/// An empty term matches everything.
pub fn search_matches(path: &Path, meta: &ImageMetadata, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }

    let name_hit = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().to_lowercase().contains(&term));

    name_hit || meta.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
}

/// Folder tiles to show: by path, reversed for Z-A, narrowed by the search term
pub fn visible_folders<'a>(
    scan: &'a ScanResult,
    sort: SortMethod,
    term: &str,
) -> Vec<&'a GalleryFolder> {
    let term = term.trim().to_lowercase();
    let mut folders: Vec<&GalleryFolder> = scan
        .folders()
        .filter(|f| !f.is_empty())
        .filter(|f| term.is_empty() || f.name().to_lowercase().contains(&term))
        .collect();

    if sort == SortMethod::NameDesc {
        folders.reverse();
    }
    folders
}

/// Image tiles to show for one folder: sorted, then filtered, then searched
pub fn visible_images(
    folder: &GalleryFolder,
    sort: SortMethod,
    filter: FilterMethod,
    term: &str,
    metadata: &mut MetadataCache,
) -> Vec<PathBuf> {
    sort_images(&folder.images, sort)
        .into_iter()
        .filter(|path| {
            let meta = metadata.get(path);
            filter.matches(meta) && search_matches(path, meta, term)
        })
        .collect()
}

/// Number of tile columns that fit in a viewport of this width
pub fn grid_columns(viewport_width: f32) -> usize {
    (((viewport_width - GRID_MARGIN) / GRID_CELL_WIDTH).floor() as usize).max(1)
}

/// What the grid is currently showing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GalleryView {
    #[default]
    Folders,
    Images(PathBuf),
}

/// Set of selected images in the image grid
#[derive(Debug, Clone, Default)]
pub struct Selection {
    paths: HashSet<PathBuf>,
}

impl Selection {
    /// Flip selection of one path; returns whether it is now selected
    pub fn toggle(&mut self, path: &Path) -> bool {
        if self.paths.remove(path) {
            false
        } else {
            self.paths.insert(path.to_path_buf());
            true
        }
    }

    pub fn select_all<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        self.paths.extend(paths.into_iter().cloned());
    }

    pub fn deselect_all<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            self.paths.remove(path);
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.remove(path);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Selected paths in path order
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.paths.iter().cloned().collect();
        paths.sort();
        paths
    }

    pub fn status_text(&self) -> String {
        match self.paths.len() {
            0 => "Ready".to_string(),
            1 => "1 item selected".to_string(),
            n => format!("{} items selected", n),
        }
    }
}

/// Browsing state of the grid: current view, sort/filter/search and selection
#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    pub view: GalleryView,
    pub sort: SortMethod,
    pub filter: FilterMethod,
    pub search: String,
    pub selection: Selection,
}

impl GalleryState {
    pub fn new(sort: SortMethod, filter: FilterMethod) -> Self {
        Self {
            sort,
            filter,
            ..Self::default()
        }
    }

    /// Switch to the image grid of one folder; search and selection reset
    pub fn open_folder(&mut self, folder: &Path) {
        self.view = GalleryView::Images(folder.to_path_buf());
        self.search.clear();
        self.selection.clear();
    }

    pub fn show_folders(&mut self) {
        self.view = GalleryView::Folders;
        self.search.clear();
        self.selection.clear();
    }

    pub fn current_folder(&self) -> Option<&Path> {
        match &self.view {
            GalleryView::Images(path) => Some(path),
            GalleryView::Folders => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::metadata;
    use std::time::Duration;

    /// Three files with distinct names, sizes and modification times
    fn sample_files() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let specs = [("b.jpg", 300, 20), ("a.jpg", 100, 30), ("c.jpg", 200, 10)];
        let mut paths = Vec::new();

        for (name, size, age_secs) in specs {
            let path = dir.path().join(name);
            fs::write(&path, vec![0u8; size]).unwrap();
            let mtime = SystemTime::now() - Duration::from_secs(age_secs * 3600);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_each_sort_mode_order() {
        let (_dir, paths) = sample_files();

        let expect = [
            (SortMethod::NameAsc, ["a.jpg", "b.jpg", "c.jpg"]),
            (SortMethod::NameDesc, ["c.jpg", "b.jpg", "a.jpg"]),
            (SortMethod::DateNewest, ["c.jpg", "b.jpg", "a.jpg"]),
            (SortMethod::DateOldest, ["a.jpg", "b.jpg", "c.jpg"]),
            (SortMethod::SizeLargest, ["b.jpg", "c.jpg", "a.jpg"]),
            (SortMethod::SizeSmallest, ["a.jpg", "c.jpg", "b.jpg"]),
        ];

        for (method, order) in expect {
            assert_eq!(names(&sort_images(&paths, method)), order, "{:?}", method);
        }
    }

    #[test]
    fn test_ties_break_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["z.png", "m.png", "a.png"]
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                fs::write(&p, b"same").unwrap();
                p
            })
            .collect();

        let sorted = sort_images(&paths, SortMethod::SizeLargest);
        assert_eq!(names(&sorted), ["a.png", "m.png", "z.png"]);
    }

    #[test]
    fn test_vanished_files_are_dropped_when_statting() {
        let (dir, mut paths) = sample_files();
        paths.push(dir.path().join("gone.jpg"));

        assert_eq!(sort_images(&paths, SortMethod::SizeSmallest).len(), 3);
        assert_eq!(sort_images(&paths, SortMethod::NameAsc).len(), 4);
    }

    #[test]
    fn test_sort_method_ids_round_trip() {
        for method in SortMethod::ALL {
            assert_eq!(method.id().parse::<SortMethod>().unwrap(), method);
        }
        assert!("by_color".parse::<SortMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&SortMethod::DateNewest).unwrap(),
            "\"date_new\""
        );
    }

    #[test]
    fn test_filter_ids() {
        for filter in FilterMethod::all() {
            assert_eq!(filter.id().parse::<FilterMethod>().unwrap(), filter);
        }
        assert_eq!(FilterMethod::all().len(), 12);
        assert!("filter_rating_9".parse::<FilterMethod>().is_err());
        assert!("filter_color_pink".parse::<FilterMethod>().is_err());
        assert_eq!(FilterMethod::Label(Some(LabelColor::Red)).to_string(), "Red Label");
        assert_eq!(FilterMethod::Rating(3).to_string(), "★ 3 Stars");
    }

    #[test]
    fn test_filter_matches() {
        let meta = ImageMetadata {
            rating: 3,
            label_color: Some(LabelColor::Blue),
            ..ImageMetadata::default()
        };
        assert!(FilterMethod::All.matches(&meta));
        assert!(FilterMethod::Rating(3).matches(&meta));
        assert!(!FilterMethod::Rating(0).matches(&meta));
        assert!(FilterMethod::Label(Some(LabelColor::Blue)).matches(&meta));
        assert!(!FilterMethod::Label(None).matches(&meta));
        assert!(FilterMethod::Label(None).matches(&ImageMetadata::default()));
    }

    #[test]
    fn test_search_by_name_or_tag() {
        let mut meta = ImageMetadata::default();
        meta.tags.insert("mountains".to_string());
        let path = Path::new("/p/IMG_2041.jpg");

        assert!(search_matches(path, &meta, ""));
        assert!(search_matches(path, &meta, "img_20"));
        assert!(search_matches(path, &meta, "MOUNT"));
        assert!(!search_matches(path, &meta, "beach"));
    }

    #[test]
    fn test_visible_images_applies_filter_and_search() {
        let (dir, paths) = sample_files();
        metadata::set_rating(&paths[0], 5).unwrap();
        metadata::set_rating(&paths[2], 5).unwrap();
        metadata::add_tag(&paths[2], "sunset").unwrap();

        let folder = GalleryFolder::new(dir.path().to_path_buf(), paths.clone());
        let mut cache = MetadataCache::new();

        let rated = visible_images(&folder, SortMethod::NameAsc, FilterMethod::Rating(5), "", &mut cache);
        assert_eq!(names(&rated), ["b.jpg", "c.jpg"]);

        let searched = visible_images(&folder, SortMethod::NameAsc, FilterMethod::All, "sun", &mut cache);
        assert_eq!(names(&searched), ["c.jpg"]);
    }

    #[test]
    fn test_visible_folders_sorting_and_search() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["alps", "beach", "city"] {
            let p = dir.path().join(sub);
            fs::create_dir_all(&p).unwrap();
            fs::write(p.join("x.jpg"), b"x").unwrap();
        }
        let scan = crate::scanner::scan_folders(
            &[dir.path().to_path_buf()],
            crate::scanner::ScanMode::Recursive,
        );

        let asc: Vec<String> = visible_folders(&scan, SortMethod::NameAsc, "")
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(asc, ["alps", "beach", "city"]);

        let desc: Vec<String> = visible_folders(&scan, SortMethod::NameDesc, "")
            .iter()
            .map(|f| f.name())
            .collect();
        assert_eq!(desc, ["city", "beach", "alps"]);

        assert_eq!(visible_folders(&scan, SortMethod::NameAsc, "BEA").len(), 1);
    }

    #[test]
    fn test_grid_columns() {
        assert_eq!(grid_columns(0.0), 1);
        assert_eq!(grid_columns(269.0), 1);
        assert_eq!(grid_columns(510.0), 2);
        assert_eq!(grid_columns(1230.0), 5);
    }

    #[test]
    fn test_selection_and_view_changes() {
        let mut state = GalleryState::new(SortMethod::NameAsc, FilterMethod::All);
        let a = PathBuf::from("/p/a.jpg");
        let b = PathBuf::from("/p/b.jpg");

        state.open_folder(Path::new("/p"));
        assert_eq!(state.current_folder(), Some(Path::new("/p")));

        assert!(state.selection.toggle(&a));
        state.selection.select_all([&a, &b]);
        assert_eq!(state.selection.status_text(), "2 items selected");
        assert!(!state.selection.toggle(&b));
        assert_eq!(state.selection.status_text(), "1 item selected");

        state.search = "x".into();
        state.show_folders();
        assert!(state.selection.is_empty());
        assert!(state.search.is_empty());
        assert_eq!(state.view, GalleryView::Folders);
    }
}
