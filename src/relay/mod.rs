//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! execute(url, options)
//!     → coordinator.rs (dedup on (method, url))
//!     → registry: current balancer
//!     → url_builder.rs (relay URL, optionally encrypted)
//!     → transport.rs (send with per-attempt deadline)
//!     → failure: rotate and retry; exhaustion: AllBalancersFailed
//!     → stats.rs (requests / successes / errors)
//! ```

pub mod coordinator;
pub mod error;
pub mod stats;
pub mod transport;
pub mod url_builder;

pub use coordinator::{RelayOutcome, RequestCoordinator, RequestKey};
pub use error::{RelayError, RelayResult};
pub use stats::{RelayStats, StatsRecorder};
pub use transport::{OutboundRequest, RelayResponse, ReqwestTransport, RequestOptions, Transport};
pub use url_builder::{ProxyTarget, ProxyUrlBuilder};
