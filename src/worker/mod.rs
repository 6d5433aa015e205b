pub mod metrics;
pub mod pool;
pub mod task;

pub use metrics::{BatchMetrics, MetricsSink, TracingMetrics};
pub use pool::{
    default_pool_size, PoolStats, RouterFactory, WorkerPool, WorkerPoolOptions,
    DEFAULT_MIN_BATCH_FOR_WORKERS, DEFAULT_WORKER_TIMEOUT,
};
pub use task::{ParseTask, WorkerResult};
