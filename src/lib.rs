//! Relay failover engine.
//!
//! Routes outbound HTTP requests for blocked hosts through an ordered pool of
//! relay servers, rotating to the next relay when one fails and falling back
//! to the direct request when every relay is exhausted.

pub mod admin;
pub mod config;
pub mod engine;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod relay;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod storage;

pub use config::schema::{RelayConfig, RelaySettings, SettingsPatch};
pub use engine::{EngineServices, RelayEngine};
pub use http::{HttpBoundary, ProxyServer};
pub use lifecycle::Shutdown;
pub use relay::{RelayError, RelayResponse, RequestOptions};
