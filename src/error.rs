use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Worker pool has been disposed")]
    PoolDisposed,

    #[error("Worker for chunk {chunk} timed out after {timeout_ms}ms")]
    WorkerTimeout { chunk: usize, timeout_ms: u64 },

    #[error("Worker for chunk {chunk} failed: {reason}")]
    WorkerFailed { chunk: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
