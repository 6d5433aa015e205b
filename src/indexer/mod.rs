pub mod progress;
pub mod walker;
pub mod watcher;

pub use progress::{BatchProgress, ProgressSnapshot};
pub use walker::FileWalker;
pub use watcher::{FileEvent, FileWatcher};
