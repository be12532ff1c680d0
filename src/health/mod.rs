//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! On demand (prober.rs):
//!     probe(balancer, test_url)
//!     → URL builder (same construction as real requests)
//!     → HEAD through the transport, 5 s deadline
//!     → ProbeReport {description, ok, status, latency, error}
//!
//! Background (monitor.rs):
//!     Periodic timer → probe_all → relay_balancer_up gauge
//! ```
//!
//! # Design Decisions
//! - Probes are informational; they never reorder or disable balancers
//! - probe_all is sequential so results come back in list order

pub mod monitor;
pub mod prober;

pub use monitor::HealthMonitor;
pub use prober::{HealthProber, ProbeReport, PROBE_TIMEOUT};
