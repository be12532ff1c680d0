//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine components produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → notices.rs (user-visible status messages)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Host notification surface
//! ```
//!
//! # Design Decisions
//! - Structured logging with request IDs on every relay event
//! - Metrics are cheap (atomic increments)
//! - Notices are optional and gated by settings

pub mod logging;
pub mod metrics;
pub mod notices;

pub use notices::{LogNotifier, NoticeLevel, Notifier, RecordingNotifier};
