/// Thumbnail cache module
///
/// This module handles:
/// - Hash-keyed thumbnail files on disk (thumbnail.rs)
/// - Generating missing thumbnails on a background thread (worker.rs)
/// - Cache statistics, invalidation and clearing

pub mod thumbnail;
pub mod worker;

pub use thumbnail::{CacheStats, ThumbnailCache};
pub use worker::{BatchSummary, ThumbnailEvent, ThumbnailWorker, WorkerState};
