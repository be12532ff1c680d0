//! relay-failover host proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client (HTTP proxy request)
//!     ──────────▶ http::server ──▶ http::boundary ──┬─▶ direct request
//!                                                   │
//!                          routing::classifier says "relay"
//!                                                   │
//!                                                   ▼
//!                                          relay::coordinator
//!                                   (dedup, bounded retry, rotation)
//!                                                   │
//!                            load_balancer::registry ─▶ relay::url_builder
//!                                                   │
//!                                                   ▼
//!                                     relay server ──▶ blocked host
//!
//!     Cross-cutting: config (TOML + hot reload), storage (JSON state),
//!     observability (tracing, metrics, notices), health (probes),
//!     admin API, lifecycle (startup/shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_failover::config::loader::load_config;
use relay_failover::config::RelayConfig;
use relay_failover::lifecycle::startup;
use relay_failover::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "relay-failover")]
#[command(about = "Forward proxy that relays blocked hosts through failover relays", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-failover starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        admin_enabled = config.admin.enabled,
        user_balancers = config.balancers.len(),
        "Configuration loaded"
    );

    startup::run(config, args.config).await
}
