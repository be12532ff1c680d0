//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Relay attempt / health probe:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On failure: coordinator rotates to the next balancer and retries
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every relay call has a deadline
//! - Retries are bounded by min(retry_count, enabled balancers)
//! - No backoff between attempts: each retry goes to a different relay

pub mod timeouts;

pub use timeouts::with_deadline;
