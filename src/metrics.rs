use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

/// Process-wide runtime counters for the collector.
///
/// Purpose:
/// - Track how many cycles ran
/// - Track rows collected and written
/// - Track failures per stage
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    pub cycles: AtomicUsize,

    pub rows_collected: AtomicUsize,
    pub rows_written: AtomicUsize,

    pub sub_query_errors: AtomicUsize,
    pub sink_errors: AtomicUsize,
}

impl RuntimeMetrics {
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line summary used by the periodic reporter.
    pub fn summary(&self) -> String {
        format!(
            "cycles={} collected={} written={} sub_query_err={} sink_err={}",
            self.cycles.load(Ordering::Relaxed),
            self.rows_collected.load(Ordering::Relaxed),
            self.rows_written.load(Ordering::Relaxed),
            self.sub_query_errors.load(Ordering::Relaxed),
            self.sink_errors.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
