/// State management module
///
/// This module handles all persisted and shared state, including:
/// - Shared data structures (data.rs)
/// - Non-destructive edit parameters (edit.rs)
/// - Per-image sidecar metadata: ratings, labels, tags (metadata.rs)
/// - Application settings in a key-value store (settings.rs)

pub mod data;
pub mod edit;
pub mod metadata;
pub mod settings;
