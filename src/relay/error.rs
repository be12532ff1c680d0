//! Relay error definitions.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while relaying a request.
///
/// The type is `Clone` because a single outcome is handed to every caller that
/// attached to the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The target URL could not be parsed as an absolute URL.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// The effective balancer list is empty.
    #[error("No active balancers available")]
    NoBalancersAvailable,

    /// The balancer definition carries a kind this build does not know.
    #[error("Unsupported balancer kind '{0}'")]
    UnsupportedBalancerKind(String),

    /// A single attempt exceeded its deadline.
    #[error("Attempt timed out after {}ms", .0.as_millis())]
    AttemptTimeout(Duration),

    /// The transport failed before a response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The relay answered with a non-2xx status.
    #[error("HTTP {}", .0.as_u16())]
    NonSuccessStatus(StatusCode),

    /// The encryption capability could not be loaded or failed.
    #[error("Encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Every attempt failed.
    #[error("All balancers failed after {attempts} attempt(s){}", last_error_suffix(.last_error))]
    AllBalancersFailed {
        attempts: u32,
        last_error: Option<Box<RelayError>>,
    },

    /// The execution task ended without reporting an outcome.
    #[error("Relay execution aborted")]
    Aborted,
}

fn last_error_suffix(last: &Option<Box<RelayError>>) -> String {
    match last {
        Some(e) => format!(": {}", e),
        None => String::new(),
    }
}

impl RelayError {
    /// True for failures of a single attempt that should drive rotation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::AttemptTimeout(_)
                | RelayError::Transport(_)
                | RelayError::NonSuccessStatus(_)
                | RelayError::UnsupportedBalancerKind(_)
        )
    }

    /// The underlying error of an exhausted call, or `self` otherwise.
    pub fn root_cause(&self) -> &RelayError {
        match self {
            RelayError::AllBalancersFailed { last_error: Some(e), .. } => e.root_cause(),
            other => other,
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
