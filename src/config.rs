//! Analyzer configuration, read from `.code-facts.toml`.
//!
//! ```toml
//! [parser]
//! max_trees = 200
//! cache_content = true
//!
//! [pool]
//! pool_size = 4
//! min_batch_for_workers = 10
//! worker_timeout_ms = 30000
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::incremental::IncrementalParserOptions;
use crate::worker::{
    default_pool_size, MetricsSink, TracingMetrics, WorkerPoolOptions, DEFAULT_MIN_BATCH_FOR_WORKERS,
    DEFAULT_WORKER_TIMEOUT,
};

pub const CONFIG_FILENAME: &str = ".code-facts.toml";

pub const ENV_POOL_SIZE: &str = "CODE_FACTS_POOL_SIZE";
pub const ENV_MAX_TREES: &str = "CODE_FACTS_MAX_TREES";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub parser: IncrementalParserOptions,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// `None` uses available parallelism minus one
    pub pool_size: Option<usize>,
    pub min_batch_for_workers: usize,
    pub worker_timeout_ms: u64,
    /// Log a summary line per batch
    pub log_metrics: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            min_batch_for_workers: DEFAULT_MIN_BATCH_FOR_WORKERS,
            worker_timeout_ms: DEFAULT_WORKER_TIMEOUT.as_millis() as u64,
            log_metrics: false,
        }
    }
}

impl PoolConfig {
    pub fn to_options(&self) -> WorkerPoolOptions {
        WorkerPoolOptions {
            pool_size: self.pool_size.unwrap_or_else(default_pool_size).max(1),
            min_batch_for_workers: self.min_batch_for_workers,
            timeout: Duration::from_millis(self.worker_timeout_ms),
            metrics: if self.log_metrics {
                Some(Arc::new(TracingMetrics) as Arc<dyn MetricsSink>)
            } else {
                None
            },
            ..WorkerPoolOptions::default()
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AnalyzerError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AnalyzerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads `.code-facts.toml` from `root`, or defaults when there is none.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILENAME);
        if path.is_file() {
            tracing::debug!("Loading config from {}", path.display());
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POOL_SIZE) {
            self.pool.pool_size = Some(parse_count(ENV_POOL_SIZE, &value)?);
        }
        if let Some(value) = lookup(ENV_MAX_TREES) {
            self.parser.max_trees = parse_count(ENV_MAX_TREES, &value)?;
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| AnalyzerError::Config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}
