//! Balancer registry and rotation cursor.
//!
//! # Responsibilities
//! - Merge user balancers with the built-ins
//! - Filter to enabled entries and sort by priority
//! - Select the current balancer round-robin
//!
//! # Design Decisions
//! - The effective list is recomputed on every access, never cached
//! - The cursor is reduced modulo the current length at read time, so it
//!   stays valid when the list shrinks between reads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::load_balancer::balancer::{builtin_balancers, BalancerSpec};
use crate::relay::error::{RelayError, RelayResult};

/// Ordered set of relays plus the shared rotation cursor.
#[derive(Debug)]
pub struct BalancerRegistry {
    builtin: Vec<BalancerSpec>,
    custom: ArcSwap<Vec<BalancerSpec>>,
    cursor: AtomicUsize,
}

impl BalancerRegistry {
    /// Registry with the compiled-in balancers and the given user balancers.
    pub fn new(custom: Vec<BalancerSpec>) -> Self {
        Self::with_builtins(builtin_balancers(), custom)
    }

    /// Registry with an explicit built-in set (tests, embedded deployments).
    pub fn with_builtins(builtin: Vec<BalancerSpec>, custom: Vec<BalancerSpec>) -> Self {
        Self {
            builtin,
            custom: ArcSwap::from_pointee(custom),
            cursor: AtomicUsize::new(0),
        }
    }

    /// User balancers followed by built-ins, enabled only, stable-sorted by priority.
    pub fn effective_balancers(&self) -> Vec<BalancerSpec> {
        let custom = self.custom.load();
        let mut all: Vec<BalancerSpec> = custom
            .iter()
            .chain(self.builtin.iter())
            .filter(|b| b.enabled)
            .cloned()
            .collect();
        all.sort_by_key(|b| b.priority);
        all
    }

    /// Number of enabled balancers.
    pub fn enabled_count(&self) -> usize {
        self.effective_balancers().len()
    }

    /// The balancer at `cursor mod len`.
    pub fn current(&self) -> RelayResult<BalancerSpec> {
        let list = self.effective_balancers();
        if list.is_empty() {
            return Err(RelayError::NoBalancersAvailable);
        }
        let index = self.cursor.load(Ordering::SeqCst) % list.len();
        Ok(list[index].clone())
    }

    /// Move the cursor to the next balancer.
    ///
    /// No-op with zero or one enabled balancer. Returns the new current
    /// balancer when the cursor moved.
    pub fn advance(&self) -> Option<BalancerSpec> {
        let list = self.effective_balancers();
        let len = list.len();
        if len <= 1 {
            return None;
        }
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        Some(list[(previous + 1) % len].clone())
    }

    /// Raw cursor value.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Snapshot of the user balancers (including disabled ones).
    pub fn custom_balancers(&self) -> Arc<Vec<BalancerSpec>> {
        self.custom.load_full()
    }

    /// Replace the user balancers.
    pub fn set_custom_balancers(&self, balancers: Vec<BalancerSpec>) {
        self.custom.store(Arc::new(balancers));
    }
}

impl Default for BalancerRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
