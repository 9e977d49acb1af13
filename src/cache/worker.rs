/// Background thumbnail generation
///
/// One worker thread walks the input list in order, generating missing cache
/// entries and sending one event per file, so the grid can update
/// incrementally instead of waiting for the whole batch.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::thumbnail::ThumbnailCache;
use crate::error::{GalleryError, Result};

/// Progress events emitted by the worker thread
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailEvent {
    /// A thumbnail is available for `source`
    Ready {
        source: PathBuf,
        thumbnail: PathBuf,
        /// True when the entry already existed and nothing was generated
        cached: bool,
    },
    /// The source could not be decoded or written; it is skipped
    Failed { source: PathBuf, reason: String },
    /// Always the last event of a batch
    Finished(BatchSummary),
}

/// Totals for one worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub generated: usize,
    pub reused: usize,
    pub failed: usize,
    /// True if `stop()` ended the batch early
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
}

/// Handle to the background worker thread.
///
/// Dropping the handle stops the worker and waits for it.
pub struct ThumbnailWorker {
    events: Receiver<ThumbnailEvent>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<BatchSummary>>,
}

impl ThumbnailWorker {
    /// Start generating thumbnails for `paths`, in order
    pub fn spawn(cache: ThumbnailCache, paths: Vec<PathBuf>) -> Result<Self> {
        let (tx, rx) = unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("thumbnail-worker".into())
            .spawn(move || run_batch(&cache, paths, &flag, &tx))?;

        Ok(Self {
            events: rx,
            cancel,
            handle: Some(handle),
        })
    }

    /// The completion channel. Disconnects after `Finished` has been sent.
    pub fn events(&self) -> &Receiver<ThumbnailEvent> {
        &self.events
    }

    /// Drain whatever events are available without blocking
    pub fn try_events(&self) -> Vec<ThumbnailEvent> {
        self.events.try_iter().collect()
    }

    /// Ask the worker to stop before its next file
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn state(&self) -> WorkerState {
        if self.is_running() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    /// Wait for the worker thread to finish and return its totals
    pub fn join(mut self) -> Result<BatchSummary> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<BatchSummary> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| GalleryError::Join("thumbnail worker panicked".into())),
            None => Ok(BatchSummary::default()),
        }
    }
}

impl Drop for ThumbnailWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
            if let Err(e) = self.join_inner() {
                log::error!("{}", e);
            }
        }
    }
}

impl std::fmt::Debug for ThumbnailWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailWorker")
            .field("state", &self.state())
            .field("pending_events", &self.events.len())
            .finish()
    }
}

/// Body of the worker thread
fn run_batch(
    cache: &ThumbnailCache,
    paths: Vec<PathBuf>,
    cancel: &AtomicBool,
    tx: &Sender<ThumbnailEvent>,
) -> BatchSummary {
    let total = paths.len();
    let mut summary = BatchSummary::default();
    log::info!("Thumbnail worker started: {} files", total);

    for source in paths {
        if cancel.load(Ordering::Relaxed) {
            summary.cancelled = true;
            break;
        }

        let event = match cache.get_or_generate(&source) {
            Ok((thumbnail, cached)) => {
                if cached {
                    summary.reused += 1;
                } else {
                    summary.generated += 1;
                }
                ThumbnailEvent::Ready {
                    source,
                    thumbnail,
                    cached,
                }
            }
            Err(e) => {
                log::warn!("Error creating thumbnail for {}: {}", source.display(), e);
                summary.failed += 1;
                ThumbnailEvent::Failed {
                    source,
                    reason: e.to_string(),
                }
            }
        };

        // Receiver gone means nobody is listening any more
        if tx.send(event).is_err() {
            summary.cancelled = true;
            break;
        }
    }

    log::info!(
        "Thumbnail worker finished: {} generated, {} reused, {} failed{}",
        summary.generated,
        summary.reused,
        summary.failed,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    let _ = tx.send(ThumbnailEvent::Finished(summary));
    summary
}
