//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Relay attempt
//!     → registry.rs (user + built-in balancers, enabled only, by priority)
//!     → current() = list[cursor mod len]
//!     → on failure: advance() rotates round-robin
//!     → balancer.rs (kind + endpoint handed to the URL builder)
//! ```
//!
//! # Design Decisions
//! - One shared cursor for all requests; rotation is global, not per request
//! - The effective list is recomputed on every read so edits apply at once
//! - A single enabled balancer never rotates

pub mod balancer;
pub mod registry;

pub use balancer::{builtin_balancers, BalancerKind, BalancerSpec};
pub use registry::BalancerRegistry;
