//! Request counters.
//!
//! Totals only ever grow (until an explicit reset) and are written to the
//! key-value store after every change so they survive restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::storage::{self, KeyValueStore, STATS_KEY};

/// Snapshot of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayStats {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
}

/// Live counters backed by the store.
pub struct StatsRecorder {
    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    store: Arc<dyn KeyValueStore>,
}

impl StatsRecorder {
    /// Counters resumed from the store.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let initial: RelayStats = storage::load_or(store.as_ref(), STATS_KEY, RelayStats::default());
        Self {
            requests: AtomicU64::new(initial.requests),
            successes: AtomicU64::new(initial.successes),
            errors: AtomicU64::new(initial.errors),
            store,
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        metrics::record_relay_request();
        self.persist();
    }

    pub fn record_success(&self, balancer: &str) {
        self.successes.fetch_add(1, Ordering::SeqCst);
        metrics::record_relay_success(balancer);
        self.persist();
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        metrics::record_relay_error();
        self.persist();
    }

    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            requests: self.requests.load(Ordering::SeqCst),
            successes: self.successes.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::SeqCst);
        self.successes.store(0, Ordering::SeqCst);
        self.errors.store(0, Ordering::SeqCst);
        self.persist();
    }

    fn persist(&self) {
        storage::save(self.store.as_ref(), STATS_KEY, &self.snapshot());
    }
}
