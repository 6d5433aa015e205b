use serde::Serialize;

/// Summary of one `parse_files` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub task_count: usize,
    pub error_count: usize,
    /// 0 for inline batches
    pub chunks: usize,
    pub inline: bool,
    pub duration_ms: f64,
}

/// Receiver for per-batch metrics.
pub trait MetricsSink: Send + Sync {
    fn record_batch(&self, metrics: &BatchMetrics);
}

/// Logs every batch at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_batch(&self, metrics: &BatchMetrics) {
        let mode = if metrics.inline { "inline" } else { "dispatched" };
        tracing::info!(
            "Parsed {} files ({} errors, {}, {} chunks) in {:.1}ms",
            metrics.task_count,
            metrics.error_count,
            mode,
            metrics.chunks,
            metrics.duration_ms
        );
    }
}
