//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempt count > 0)
//! - Check that balancer endpoints and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Unknown balancer kinds are not rejected here; they fail at use time

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.settings.timeout_ms == 0 {
        errors.push(ValidationError::new("settings.timeout_ms", "must be greater than 0"));
    }
    if config.settings.retry_count == 0 {
        errors.push(ValidationError::new("settings.retry_count", "must be greater than 0"));
    }

    for (i, balancer) in config.balancers.iter().enumerate() {
        if Url::parse(&balancer.endpoint).is_err() {
            errors.push(ValidationError::new(
                format!("balancers[{}].endpoint", i),
                format!("'{}' is not an absolute URL", balancer.endpoint),
            ));
        }
    }

    for (i, rule) in config.auth.iter().enumerate() {
        if rule.domain.trim().is_empty() {
            errors.push(ValidationError::new(format!("auth[{}].domain", i), "must not be empty"));
        }
    }

    for (i, domain) in config.blocked_domains.iter().enumerate() {
        if domain.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("blocked_domains[{}]", i),
                "must not be empty",
            ));
        }
    }

    if Url::parse(&config.health.test_url).is_err() {
        errors.push(ValidationError::new(
            "health.test_url",
            format!("'{}' is not an absolute URL", config.health.test_url),
        ));
    }

    let addresses = [
        ("listener.bind_address", &config.listener.bind_address),
        ("admin.bind_address", &config.admin.bind_address),
        ("observability.metrics_address", &config.observability.metrics_address),
    ];
    for (field, address) in addresses {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(field, format!("'{}' is not a socket address", address)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::balancer::{BalancerKind, BalancerSpec};
    use crate::config::schema::AuthRule;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RelayConfig::default();
        config.settings.timeout_ms = 0;
        config.settings.retry_count = 0;
        config
            .balancers
            .push(BalancerSpec::new(BalancerKind::GenericProxy, "not a url", "bad", 1));
        config.auth.push(AuthRule::new(" ", "token"));
        config.listener.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "settings.timeout_ms",
                "settings.retry_count",
                "balancers[0].endpoint",
                "auth[0].domain",
                "listener.bind_address",
            ]
        );
    }
}
