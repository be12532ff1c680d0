//! Relay balancer definitions.
//!
//! # Responsibilities
//! - Represent one relay endpoint and how URLs are built for it
//! - Provide the compiled-in default balancers

use std::fmt;

use serde::{Deserialize, Serialize};

/// URL construction strategy of a balancer.
///
/// Serialized as a snake_case string. Unknown strings are kept as
/// `Unsupported` so a bad user entry is reported when used instead of
/// failing the whole configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BalancerKind {
    /// Worker that accepts either `?url=` or an encrypted `?data=` payload.
    CloudflareWorker,
    /// Proxy taking the target as a `url` query parameter.
    GenericProxy,
    /// Proxy taking the raw target appended to its path.
    UrlReplace,
    /// Anything else found in configuration.
    Unsupported(String),
}

impl BalancerKind {
    pub fn as_str(&self) -> &str {
        match self {
            BalancerKind::CloudflareWorker => "cloudflare_worker",
            BalancerKind::GenericProxy => "generic_proxy",
            BalancerKind::UrlReplace => "url_replace",
            BalancerKind::Unsupported(name) => name,
        }
    }
}

impl From<String> for BalancerKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cloudflare_worker" => BalancerKind::CloudflareWorker,
            "generic_proxy" => BalancerKind::GenericProxy,
            "url_replace" => BalancerKind::UrlReplace,
            _ => BalancerKind::Unsupported(value),
        }
    }
}

impl From<&str> for BalancerKind {
    fn from(value: &str) -> Self {
        BalancerKind::from(value.to_string())
    }
}

impl From<BalancerKind> for String {
    fn from(kind: BalancerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BalancerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relay definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerSpec {
    /// URL construction strategy.
    pub kind: BalancerKind,

    /// Base URL of the relay.
    #[serde(alias = "url")]
    pub endpoint: String,

    /// Human readable label.
    #[serde(default)]
    pub description: String,

    /// Lower values are tried first.
    #[serde(default)]
    pub priority: i32,

    /// Disabled balancers are never selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl BalancerSpec {
    /// Create an enabled balancer.
    pub fn new(
        kind: impl Into<BalancerKind>,
        endpoint: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            kind: kind.into(),
            endpoint: endpoint.into(),
            description: description.into(),
            priority,
            enabled: true,
        }
    }

    /// Same balancer with a different enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Label for logs: the description, or the endpoint when unnamed.
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.endpoint
        } else {
            &self.description
        }
    }
}

/// The compiled-in relays, in priority order.
pub fn builtin_balancers() -> Vec<BalancerSpec> {
    vec![
        BalancerSpec::new(
            BalancerKind::CloudflareWorker,
            "https://cors.apn.monster/cors/",
            "CORS APN Monster",
            1,
        ),
        BalancerSpec::new(
            BalancerKind::GenericProxy,
            "https://api.allorigins.win/raw?url=",
            "AllOrigins Proxy",
            2,
        ),
        BalancerSpec::new(
            BalancerKind::GenericProxy,
            "https://cors-anywhere.herokuapp.com/",
            "CORS Anywhere",
            3,
        ),
        BalancerSpec::new(
            BalancerKind::UrlReplace,
            "https://thingproxy.freeboard.io/fetch/",
            "Thing Proxy",
            4,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(BalancerKind::from("generic_proxy"), BalancerKind::GenericProxy);
        assert_eq!(BalancerKind::from("url_replace"), BalancerKind::UrlReplace);
        assert_eq!(
            BalancerKind::from("socks5"),
            BalancerKind::Unsupported("socks5".to_string())
        );
    }

    #[test]
    fn test_spec_deserialization() {
        let json = r#"{"kind":"cloudflare_worker","url":"https://w.example/","priority":7}"#;
        let spec: BalancerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, BalancerKind::CloudflareWorker);
        assert_eq!(spec.endpoint, "https://w.example/");
        assert_eq!(spec.priority, 7);
        assert!(spec.enabled);
        assert_eq!(spec.label(), "https://w.example/");

        let unknown: BalancerSpec =
            serde_json::from_str(r#"{"kind":"carrier_pigeon","endpoint":"x"}"#).unwrap();
        assert_eq!(unknown.kind, BalancerKind::Unsupported("carrier_pigeon".into()));
        assert_eq!(serde_json::to_value(&unknown).unwrap()["kind"], "carrier_pigeon");
    }

    #[test]
    fn test_builtins_sorted_and_enabled() {
        let builtins = builtin_balancers();
        assert_eq!(builtins.len(), 4);
        assert!(builtins.iter().all(|b| b.enabled));
        assert!(builtins.windows(2).all(|w| w[0].priority <= w[1].priority));
    }
}
