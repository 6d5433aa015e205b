use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::worker::WorkerResult;

const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}";

/// Progress of one batch run through the worker pool. Clones share counters.
#[derive(Clone)]
pub struct BatchProgress {
    counters: Arc<Counters>,
    bar: Option<ProgressBar>,
}

#[derive(Default)]
struct Counters {
    total: AtomicUsize,
    parsed: AtomicUsize,
    failed: AtomicUsize,
    facts: AtomicUsize,
    running: AtomicBool,
    started: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub running: bool,
    pub total: usize,
    pub parsed: usize,
    pub failed: usize,
    pub facts: usize,
    pub elapsed_ms: u64,
    pub percent: f64,
}

impl ProgressSnapshot {
    pub fn done(&self) -> usize {
        self.parsed + self.failed
    }
}

impl BatchProgress {
    /// Counters only, nothing drawn.
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            bar: None,
        }
    }

    /// Counters plus a bar on stderr.
    pub fn with_bar() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style);
        }
        Self {
            bar: Some(bar),
            ..Self::new()
        }
    }

    pub fn start(&self, total: usize) {
        let c = &self.counters;
        c.total.store(total, Ordering::SeqCst);
        for counter in [&c.parsed, &c.failed, &c.facts] {
            counter.store(0, Ordering::SeqCst);
        }
        c.running.store(true, Ordering::SeqCst);
        *c.started.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        if let Some(bar) = &self.bar {
            bar.set_length(total as u64);
            bar.set_position(0);
        }
    }

    /// Counts one finished task.
    pub fn record(&self, result: &WorkerResult) {
        let c = &self.counters;
        if result.is_ok() {
            c.parsed.fetch_add(1, Ordering::Relaxed);
            c.facts.fetch_add(result.result.fact_count(), Ordering::Relaxed);
        } else {
            c.failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(bar) = &self.bar {
            bar.inc(1);
            if !result.is_ok() {
                bar.set_message(format!("{} failed", c.failed.load(Ordering::Relaxed)));
            }
        }
    }

    pub fn finish(&self) {
        self.counters.running.store(false, Ordering::SeqCst);
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let c = &self.counters;
        let total = c.total.load(Ordering::SeqCst);
        let parsed = c.parsed.load(Ordering::SeqCst);
        let failed = c.failed.load(Ordering::SeqCst);
        let started = *c.started.lock().unwrap_or_else(|p| p.into_inner());

        ProgressSnapshot {
            running: c.running.load(Ordering::SeqCst),
            total,
            parsed,
            failed,
            facts: c.facts.load(Ordering::SeqCst),
            elapsed_ms: started.map_or(0, |t| t.elapsed().as_millis() as u64),
            percent: match total {
                0 => 0.0,
                n => (parsed + failed) as f64 * 100.0 / n as f64,
            },
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}
