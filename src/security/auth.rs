//! Per-domain credential lookup.
//!
//! # Responsibilities
//! - Map a target hostname to the credential configured for it
//! - Produce the header the relay forwards to the target
//!
//! # Design Decisions
//! - First matching rule wins (configuration order)
//! - Never fails: bad URLs or unusable tokens yield no header

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::AuthRule;

/// Header carrying the per-domain credential.
pub const AUTH_HEADER: HeaderName = HeaderName::from_static("x-relay-auth");

/// Ordered domain → token table.
#[derive(Debug, Clone, Default)]
pub struct AuthTable {
    rules: Vec<AuthRule>,
}

impl AuthTable {
    pub fn new(rules: Vec<AuthRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[AuthRule] {
        &self.rules
    }

    /// Headers to attach for `target_url`.
    pub fn headers_for(&self, target_url: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let hostname = match Url::parse(target_url) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_lowercase(),
                None => return headers,
            },
            Err(e) => {
                tracing::debug!(url = %target_url, error = %e, "Auth lookup skipped for malformed URL");
                return headers;
            }
        };

        let rule = self
            .rules
            .iter()
            .find(|r| !r.domain.is_empty() && hostname.contains(&r.domain.to_lowercase()));

        if let Some(rule) = rule {
            match HeaderValue::from_str(&rule.token) {
                Ok(value) => {
                    headers.insert(AUTH_HEADER, value);
                }
                Err(_) => {
                    tracing::warn!(domain = %rule.domain, "Auth token is not a valid header value");
                }
            }
        }
        headers
    }
}
