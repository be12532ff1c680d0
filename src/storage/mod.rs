//! Persistent key-value storage.
//!
//! # Data Flow
//! ```text
//! RelayEngine::create
//!     → load settings / balancers / auth / stats (defaults on any failure)
//! Settings change, balancer edit, counter increment
//!     → save under its key (failures logged, never propagated)
//! ```
//!
//! # Design Decisions
//! - Values are JSON so every backend stores the same shape
//! - Reads and writes are non-fatal for the engine

pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Storage key for engine settings.
pub const SETTINGS_KEY: &str = "relay_settings";
/// Storage key for the per-domain auth table.
pub const AUTH_KEY: &str = "relay_auth";
/// Storage key for user balancers.
pub const BALANCERS_KEY: &str = "relay_balancers";
/// Storage key for request counters.
pub const STATS_KEY: &str = "relay_stats";

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value persistence used for settings and counters.
pub trait KeyValueStore: Send + Sync {
    /// Raw value for `key`, if present.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Store `value` under `key`.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// Typed read that falls back to `default` on a missing key or any error.
pub fn load_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stored value has unexpected shape, using default");
                default
            }
        },
        Ok(None) => default,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Storage read failed, using default");
            default
        }
    }
}

/// Typed write. Failures are logged and swallowed.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_value(value)
        .map_err(StoreError::from)
        .and_then(|v| store.set(key, v));
    if let Err(e) = result {
        tracing::error!(key = %key, error = %e, "Storage write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_falls_back() {
        let store = MemoryStore::new();
        assert_eq!(load_or(&store, "missing", 7u32), 7);

        store.set("wrong", serde_json::json!("text")).unwrap();
        assert_eq!(load_or(&store, "wrong", 3u32), 3);

        save(&store, "count", &11u32);
        assert_eq!(load_or(&store, "count", 0u32), 11);
    }
}
