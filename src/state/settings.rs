use rusqlite::{Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GalleryError, Result};
use crate::gallery::{FilterMethod, SortMethod};
use crate::scanner::ScanMode;

const KEY_FOLDERS: &str = "gallery_folders";
const KEY_SORT: &str = "sort_method";
const KEY_FILTER: &str = "filter_method";
const KEY_GEOMETRY: &str = "geometry";
const KEY_SCAN_MODE: &str = "scan_mode";

/// Saved main window position and size
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 1200,
            height: 800,
        }
    }
}

impl WindowGeometry {
    /// Same size, new top-left corner (logical pixels)
    pub fn moved_to(self, x: f32, y: f32) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
            ..self
        }
    }

    /// Same position, new size; never below one pixel
    pub fn resized_to(self, width: f32, height: f32) -> Self {
        Self {
            width: width.round().max(1.0) as u32,
            height: height.round().max(1.0) as u32,
            ..self
        }
    }
}

/// Settings manages the persisted application preferences.
/// Values live as JSON strings in a single SQLite key-value table.
pub struct Settings {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Settings {
    /// Open the settings store in the user's data directory:
    /// - Linux: ~/.local/share/photo-gallery/settings.db
    /// - macOS: ~/Library/Application Support/photo-gallery/settings.db
    /// - Windows: %APPDATA%\photo-gallery\settings.db
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_db_path()?)
    }

    /// Open or create the store at `db_path`
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        log::info!("Settings store at {}", db_path.display());

        let settings = Settings {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        settings.init_schema()?;
        Ok(settings)
    }

    /// A throwaway store, nothing is persisted
    pub fn open_in_memory() -> Result<Self> {
        let settings = Settings {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        settings.init_schema()?;
        Ok(settings)
    }

    fn default_db_path() -> Result<PathBuf> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(GalleryError::NoDirectory("user data"))?;

        path.push("photo-gallery");
        path.push("settings.db");
        Ok(path)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key     TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Path to the database file, None for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Read a value, falling back to the default when absent or unreadable
    fn get<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get_raw(key) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt setting '{}': {}", key, e);
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                log::warn!("Could not read setting '{}': {}", key, e);
                T::default()
            }
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, json],
        )?;
        Ok(())
    }

    /// Root folders scanned by the gallery
    pub fn gallery_folders(&self) -> Vec<PathBuf> {
        self.get(KEY_FOLDERS)
    }

    pub fn set_gallery_folders(&self, folders: &[PathBuf]) -> Result<()> {
        self.set(KEY_FOLDERS, &folders)
    }

    /// Add a root folder; returns false if it was already configured
    pub fn add_folder(&self, folder: &Path) -> Result<bool> {
        let mut folders = self.gallery_folders();
        if folders.iter().any(|f| f == folder) {
            return Ok(false);
        }
        folders.push(folder.to_path_buf());
        self.set_gallery_folders(&folders)?;
        Ok(true)
    }

    /// Remove a root folder; returns false if it was not configured
    pub fn remove_folder(&self, folder: &Path) -> Result<bool> {
        let mut folders = self.gallery_folders();
        let before = folders.len();
        folders.retain(|f| f != folder);
        if folders.len() == before {
            return Ok(false);
        }
        self.set_gallery_folders(&folders)?;
        Ok(true)
    }

    pub fn sort_method(&self) -> SortMethod {
        self.get(KEY_SORT)
    }

    pub fn set_sort_method(&self, method: SortMethod) -> Result<()> {
        self.set(KEY_SORT, &method)
    }

    pub fn filter_method(&self) -> FilterMethod {
        self.get(KEY_FILTER)
    }

    pub fn set_filter_method(&self, method: FilterMethod) -> Result<()> {
        self.set(KEY_FILTER, &method)
    }

    pub fn window_geometry(&self) -> WindowGeometry {
        self.get(KEY_GEOMETRY)
    }

    pub fn set_window_geometry(&self, geometry: WindowGeometry) -> Result<()> {
        self.set(KEY_GEOMETRY, &geometry)
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.get(KEY_SCAN_MODE)
    }

    pub fn set_scan_mode(&self, mode: ScanMode) -> Result<()> {
        self.set(KEY_SCAN_MODE, &mode)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("db_path", &self.db_path)
            .finish()
    }
}
