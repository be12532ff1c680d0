//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Client (proxy request)
//!     → server.rs (Axum forward proxy, request id, body buffering)
//!     → boundary.rs (shim installed? classifier says relay?)
//!         → yes: coordinator; on failure fall back to the direct request
//!         → no: direct request
//!     → Response passed back unmodified
//! ```

pub mod boundary;
pub mod request;
pub mod server;

pub use boundary::{HttpBoundary, RelayInterceptor};
pub use request::{request_id_middleware, RequestId, X_REQUEST_ID};
pub use server::{ProxyServer, ProxyState};
