use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};

use crate::error::{AnalyzerError, Result};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Modified(p) | FileEvent::Deleted(p) => p,
        }
    }
}

type EventBatch = std::result::Result<Vec<DebouncedEvent>, notify::Error>;

/// Debounced recursive watch over a directory.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<EventBatch>,
}

impl FileWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_debounce(path, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(path: &Path, debounce: Duration) -> Result<Self> {
        let (tx, rx) = channel();

        let mut debouncer =
            new_debouncer(debounce, tx).map_err(|e| AnalyzerError::Watcher(e.to_string()))?;

        debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| AnalyzerError::Watcher(e.to_string()))?;

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
        })
    }

    /// Blocks for the next batch. `Ok(None)` means the batch only touched
    /// directories; an error means the watcher has stopped.
    pub fn recv(&self) -> Result<Option<Vec<FileEvent>>> {
        match self.receiver.recv() {
            Ok(batch) => Ok(to_file_events(batch)),
            Err(_) => Err(AnalyzerError::Watcher("watcher channel closed".to_string())),
        }
    }

    /// Like [`recv`](Self::recv) with an upper bound on the wait.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<FileEvent>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(batch) => Ok(to_file_events(batch)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AnalyzerError::Watcher("watcher channel closed".to_string()))
            }
        }
    }
}

fn to_file_events(batch: EventBatch) -> Option<Vec<FileEvent>> {
    let events = match batch {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("File watcher error: {}", e);
            return None;
        }
    };

    let mut file_events: Vec<FileEvent> = events
        .into_iter()
        .filter_map(|e| {
            let path = e.path;
            if path.is_file() {
                Some(FileEvent::Modified(path))
            } else if !path.exists() {
                Some(FileEvent::Deleted(path))
            } else {
                None
            }
        })
        .collect();
    file_events.dedup();

    if file_events.is_empty() {
        None
    } else {
        Some(file_events)
    }
}
