//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated)
//!     → RelayEngine::create (settings, balancers, auth, blocked list)
//!
//! On file change:
//!     watcher.rs collects the event burst
//!     → loader.rs loads and validates the file
//!     → ConfigReload (only settings / auth that changed)
//!     → RelayEngine::update_settings, RelayEngine::set_auth_rules
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Settings changed at runtime are persisted in the key-value store, the
//!   file only seeds them

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, AuthRule, HealthConfig, ListenerConfig, ObservabilityConfig, RelayConfig,
    RelaySettings, SettingsPatch, StorageConfig, DEFAULT_ENCRYPTION_KEY, DEFAULT_PROBE_URL,
};
