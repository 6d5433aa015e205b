use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::adapter::LanguageRouter;
use crate::error::AnalyzerError;
use crate::facts::ParseResult;

/// One file to parse in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseTask {
    pub file_path: String,
    pub content: String,
    /// Adapter name to use instead of extension lookup.
    pub language: Option<String>,
}

impl ParseTask {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Outcome of one [`ParseTask`]. A failed task has `error` set and an empty
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub file_path: String,
    pub result: ParseResult,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn failed(file_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            result: ParseResult::default(),
            duration_ms: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Parses one task with whatever adapter `router` picks for it. Never fails;
/// errors end up in [`WorkerResult::error`].
pub(crate) fn run_task(router: &LanguageRouter, task: &ParseTask) -> WorkerResult {
    let start = Instant::now();

    let adapter = task
        .language
        .as_deref()
        .and_then(|name| router.get_by_name(name))
        .or_else(|| router.try_get_adapter(&task.file_path));

    let outcome = match adapter {
        Some(adapter) => adapter
            .parse_file(&task.content, &task.file_path)
            .map(|parsed| parsed.result),
        None => Err(AnalyzerError::UnsupportedLanguage(task.file_path.clone())),
    };

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(result) => WorkerResult {
            file_path: task.file_path.clone(),
            result,
            duration_ms,
            error: None,
        },
        Err(e) => WorkerResult {
            duration_ms,
            ..WorkerResult::failed(task.file_path.clone(), e.to_string())
        },
    }
}
