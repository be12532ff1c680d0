//! Routing subsystem: which requests go through a relay.
//!
//! # Data Flow
//! ```text
//! Outbound request URL
//!     → classifier.rs (local / infrastructure / blocked-list checks)
//!     → Relay (coordinator) or Direct (original transport)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of the URL and current settings
//! - Deterministic: same input always gives the same decision

pub mod classifier;

pub use classifier::{DomainClassifier, BLOCKED_DOMAINS, INFRASTRUCTURE_HOSTS};
