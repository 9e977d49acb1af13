use thiserror::Error;

/// Unified error type for gallery operations.
///
/// Batch operations (scanning, thumbnail generation, trashing several files)
/// log a per-file error and continue; everything else propagates it.
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings store failed: {0}")]
    Settings(#[from] rusqlite::Error),

    #[error("Trash operation failed: {0}")]
    Trash(#[from] trash::Error),

    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),

    #[error("Invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Task join error: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, GalleryError>;

impl GalleryError {
    pub fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        GalleryError::InvalidValue {
            kind,
            value: value.into(),
        }
    }
}
