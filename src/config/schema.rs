//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay engine
//! and its host proxy. All types derive Serde traits for deserialization from
//! config files and for persistence in the key-value store.

use serde::{Deserialize, Serialize};

use crate::load_balancer::balancer::BalancerSpec;

/// Default passphrase for encrypted worker payloads.
pub const DEFAULT_ENCRYPTION_KEY: &str = "relay_bypass_key";

/// Default target for balancer probes.
pub const DEFAULT_PROBE_URL: &str = "https://httpbin.org/json";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Runtime engine settings.
    pub settings: RelaySettings,

    /// User-defined balancers (seeded into storage when none are stored yet).
    pub balancers: Vec<BalancerSpec>,

    /// Append the compiled-in balancers to the user list.
    pub use_builtin_balancers: bool,

    /// Per-domain credentials, first match wins.
    pub auth: Vec<AuthRule>,

    /// Extra blocked-domain substrings on top of the built-in list.
    pub blocked_domains: Vec<String>,

    /// Host of the embedding application; requests to it are never relayed.
    pub page_host: Option<String>,

    /// Host proxy listener.
    pub listener: ListenerConfig,

    /// Admin API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Background balancer probing.
    pub health: HealthConfig,

    /// Persistent state location.
    pub storage: StorageConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            settings: RelaySettings::default(),
            balancers: Vec::new(),
            use_builtin_balancers: true,
            auth: Vec::new(),
            blocked_domains: Vec::new(),
            page_host: None,
            listener: ListenerConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
            health: HealthConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Engine settings. Persisted in the key-value store on every change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Master switch. When false nothing is relayed.
    pub enabled: bool,

    /// Log every attempt at info level.
    pub debug_logging: bool,

    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,

    /// Upper bound on attempts per logical request.
    pub retry_count: u32,

    /// Send worker targets in the clear instead of encrypted.
    pub simple_mode: bool,

    /// Passphrase for encrypted worker payloads.
    pub encryption_key: String,

    /// Only relay hosts on the blocked-domain list.
    pub restrict_to_known_blocked_hosts: bool,

    /// Rotate to the next balancer after a failed attempt.
    pub auto_rotate_on_failure: bool,

    /// Emit user-visible notices.
    pub show_notifications: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_logging: false,
            timeout_ms: 15_000,
            retry_count: 3,
            simple_mode: false,
            encryption_key: DEFAULT_ENCRYPTION_KEY.to_string(),
            restrict_to_known_blocked_hosts: true,
            auto_rotate_on_failure: true,
            show_notifications: true,
        }
    }
}

impl RelaySettings {
    /// Apply a partial update, returning the merged settings.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = patch.debug_logging {
            next.debug_logging = v;
        }
        if let Some(v) = patch.timeout_ms {
            next.timeout_ms = v;
        }
        if let Some(v) = patch.retry_count {
            next.retry_count = v;
        }
        if let Some(v) = patch.simple_mode {
            next.simple_mode = v;
        }
        if let Some(v) = &patch.encryption_key {
            next.encryption_key = if v.is_empty() {
                DEFAULT_ENCRYPTION_KEY.to_string()
            } else {
                v.clone()
            };
        }
        if let Some(v) = patch.restrict_to_known_blocked_hosts {
            next.restrict_to_known_blocked_hosts = v;
        }
        if let Some(v) = patch.auto_rotate_on_failure {
            next.auto_rotate_on_failure = v;
        }
        if let Some(v) = patch.show_notifications {
            next.show_notifications = v;
        }
        next
    }
}

/// Partial settings update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub debug_logging: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    pub simple_mode: Option<bool>,
    pub encryption_key: Option<String>,
    pub restrict_to_known_blocked_hosts: Option<bool>,
    pub auto_rotate_on_failure: Option<bool>,
    pub show_notifications: Option<bool>,
}

impl From<&RelaySettings> for SettingsPatch {
    fn from(s: &RelaySettings) -> Self {
        Self {
            enabled: Some(s.enabled),
            debug_logging: Some(s.debug_logging),
            timeout_ms: Some(s.timeout_ms),
            retry_count: Some(s.retry_count),
            simple_mode: Some(s.simple_mode),
            encryption_key: Some(s.encryption_key.clone()),
            restrict_to_known_blocked_hosts: Some(s.restrict_to_known_blocked_hosts),
            auto_rotate_on_failure: Some(s.auto_rotate_on_failure),
            show_notifications: Some(s.show_notifications),
        }
    }
}

/// One per-domain credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthRule {
    /// Substring matched against the target hostname.
    pub domain: String,

    /// Opaque token sent to the relay.
    pub token: String,
}

impl AuthRule {
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            token: token.into(),
        }
    }
}

/// Host proxy listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8118").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum buffered request body.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8118".to_string(),
            request_timeout_secs: 60,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8119".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Background probing of the balancer list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds between probe rounds. 0 disables background probing.
    pub probe_interval_secs: u64,

    /// URL requested through each balancer.
    pub test_url: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 0,
            test_url: DEFAULT_PROBE_URL.to_string(),
        }
    }
}

/// Persistent state configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON state file. In-memory storage when unset.
    pub path: Option<String>,
}
