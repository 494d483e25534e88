//! Request accounting.
//!
//! The client reports every request it sends to a [`MetricsSink`]. The sink
//! is injected, so each run (or each test) can own a fresh counter instead
//! of sharing process-wide state.

use std::collections::BTreeMap;
use std::fmt;

use http::Method;
use parking_lot::Mutex;

/// Receives one notification per request sent.
pub trait MetricsSink: Send + Sync + fmt::Debug + 'static {
    /// Record that a request with `method` is being sent.
    fn record_call(&self, method: &Method);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_call(&self, _method: &Method) {}
}

/// Per-method request counters guarded by a mutex.
#[derive(Debug, Default)]
pub struct CallStats {
    calls: Mutex<BTreeMap<String, u64>>,
}

impl CallStats {
    /// Create an empty counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests recorded for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> u64 {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Number of requests recorded across all methods.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.calls.lock().values().sum()
    }

    /// A copy of the counters, ordered by method name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.calls.lock().clone()
    }
}

impl MetricsSink for CallStats {
    fn record_call(&self, method: &Method) {
        *self.calls.lock().entry(method.as_str().to_owned()).or_insert(0) += 1;
    }
}

impl fmt::Display for CallStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let calls = self.snapshot();
        let total: u64 = calls.values().sum();
        for (method, count) in &calls {
            write!(f, "{method}: {count}, ")?;
        }
        write!(f, "total: {total}")
    }
}
