//! Background probing.
//!
//! # Responsibilities
//! - Periodically probe every enabled balancer
//! - Keep the `relay_balancer_up` gauge current

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::HealthConfig;
use crate::health::prober::HealthProber;

pub struct HealthMonitor {
    prober: Arc<HealthProber>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(prober: Arc<HealthProber>, config: HealthConfig) -> Self {
        Self { prober, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.config.probe_interval_secs == 0 {
            tracing::info!("Background probing disabled");
            return;
        }

        tracing::info!(
            interval = self.config.probe_interval_secs,
            test_url = %self.config.test_url,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.probe_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.prober.probe_all(&self.config.test_url).await;
                    let up = reports.iter().filter(|r| r.ok).count();
                    tracing::info!(up, total = reports.len(), "Probe round complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
