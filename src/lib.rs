//! Photo gallery core: folder scanning, a hash-keyed thumbnail cache with
//! a background worker, sidecar metadata (ratings, labels, tags, edits),
//! gallery sort/filter/search logic and the single-image viewer state.

pub mod cache;
pub mod error;
pub mod fileops;
pub mod gallery;
pub mod scanner;
pub mod state;
pub mod viewer;

pub use error::{GalleryError, Result};
