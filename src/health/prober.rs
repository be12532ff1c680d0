//! On-demand balancer probing.
//!
//! # Responsibilities
//! - Send one lightweight request through a balancer
//! - Report reachability, status and latency
//!
//! # Design Decisions
//! - HEAD request with a fixed 5 s deadline, independent of `timeout_ms`
//! - Probes go straight to the transport and never touch the stats counters
//! - A failing probe is a report, not an error

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;

use crate::config::schema::RelaySettings;
use crate::load_balancer::balancer::BalancerSpec;
use crate::load_balancer::registry::BalancerRegistry;
use crate::observability::metrics;
use crate::relay::error::RelayResult;
use crate::relay::transport::{OutboundRequest, RelayResponse, Transport};
use crate::relay::url_builder::ProxyUrlBuilder;
use crate::resilience::with_deadline;

/// Deadline for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const PROBE_USER_AGENT: &str = concat!("relay-failover-probe/", env!("CARGO_PKG_VERSION"));

/// Result of probing one balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub description: String,
    pub ok: bool,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Wall time of the probe, when a response arrived.
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Probes balancers through the same URL construction as real requests.
pub struct HealthProber {
    registry: Arc<BalancerRegistry>,
    builder: ProxyUrlBuilder,
    transport: Arc<dyn Transport>,
    settings: Arc<ArcSwap<RelaySettings>>,
}

impl HealthProber {
    pub fn new(
        registry: Arc<BalancerRegistry>,
        builder: ProxyUrlBuilder,
        transport: Arc<dyn Transport>,
        settings: Arc<ArcSwap<RelaySettings>>,
    ) -> Self {
        Self {
            registry,
            builder,
            transport,
            settings,
        }
    }

    /// Probe `balancer` by relaying a HEAD request for `test_url`.
    pub async fn probe(&self, balancer: &BalancerSpec, test_url: &str) -> ProbeReport {
        let started = Instant::now();
        let outcome = self.send_probe(balancer, test_url).await;
        let elapsed = started.elapsed().as_millis() as u64;

        let report = match outcome {
            Ok(response) => {
                let ok = response.status.is_success();
                ProbeReport {
                    description: balancer.label().to_string(),
                    ok,
                    status: Some(response.status.as_u16()),
                    latency_ms: Some(elapsed),
                    error: (!ok).then(|| format!("HTTP {}", response.status.as_u16())),
                }
            }
            Err(e) => ProbeReport {
                description: balancer.label().to_string(),
                ok: false,
                status: None,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        };

        if report.ok {
            tracing::debug!(balancer = %report.description, latency_ms = elapsed, "Probe succeeded");
        } else {
            tracing::warn!(
                balancer = %report.description,
                error = report.error.as_deref().unwrap_or_default(),
                "Probe failed"
            );
        }
        metrics::record_balancer_up(&report.description, report.ok);
        report
    }

    /// Probe every enabled balancer, one after another.
    pub async fn probe_all(&self, test_url: &str) -> Vec<ProbeReport> {
        let balancers = self.registry.effective_balancers();
        let mut reports = Vec::with_capacity(balancers.len());
        for balancer in &balancers {
            reports.push(self.probe(balancer, test_url).await);
        }
        reports
    }

    async fn send_probe(&self, balancer: &BalancerSpec, test_url: &str) -> RelayResult<RelayResponse> {
        let settings = self.settings.load_full();
        let target = self.builder.build(test_url, balancer, &settings).await?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));

        let request = OutboundRequest {
            method: Method::HEAD,
            url: target.url,
            headers,
            body: None,
        };
        with_deadline(PROBE_TIMEOUT, self.transport.send(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;

    use crate::load_balancer::balancer::BalancerKind;
    use crate::relay::error::RelayError;
    use crate::security::cipher::BuiltinCipherProvider;

    struct HostStatus {
        seen: Mutex<Vec<(Method, String)>>,
    }

    impl Transport for HostStatus {
        fn send(&self, request: OutboundRequest) -> BoxFuture<'_, RelayResult<RelayResponse>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push((request.method.clone(), request.url.clone()));
                if request.url.starts_with("https://up/") {
                    Ok(RelayResponse::new(StatusCode::OK, ""))
                } else if request.url.starts_with("https://busy/") {
                    Ok(RelayResponse::new(StatusCode::SERVICE_UNAVAILABLE, ""))
                } else {
                    Err(RelayError::Transport("connection refused".into()))
                }
            })
        }
    }

    fn prober(balancers: Vec<BalancerSpec>, transport: Arc<HostStatus>) -> HealthProber {
        HealthProber::new(
            Arc::new(BalancerRegistry::with_builtins(balancers, Vec::new())),
            ProxyUrlBuilder::new(Arc::new(BuiltinCipherProvider)),
            transport,
            Arc::new(ArcSwap::from_pointee(RelaySettings::default())),
        )
    }

    #[tokio::test]
    async fn test_probe_all_reports_each_balancer() {
        let transport = Arc::new(HostStatus { seen: Mutex::new(Vec::new()) });
        let p = prober(
            vec![
                BalancerSpec::new(BalancerKind::GenericProxy, "https://down/", "down", 1),
                BalancerSpec::new(BalancerKind::GenericProxy, "https://busy/", "busy", 2),
                BalancerSpec::new(BalancerKind::UrlReplace, "https://up/", "up", 3),
            ],
            transport.clone(),
        );

        let reports = p.probe_all("https://httpbin.org/json").await;
        assert_eq!(reports.len(), 3);

        assert!(!reports[0].ok);
        assert_eq!(reports[0].status, None);
        assert!(reports[0].error.as_deref().unwrap().contains("connection refused"));

        assert!(!reports[1].ok);
        assert_eq!(reports[1].status, Some(503));

        assert!(reports[2].ok);
        assert_eq!(reports[2].status, Some(200));
        assert!(reports[2].latency_ms.is_some());
        assert!(reports[2].error.is_none());

        let seen = transport.seen.lock().unwrap();
        assert!(seen.iter().all(|(method, _)| method == Method::HEAD));
        assert_eq!(seen[2].1, "https://up/https://httpbin.org/json");
    }

    #[tokio::test]
    async fn test_unsupported_kind_reported() {
        let transport = Arc::new(HostStatus { seen: Mutex::new(Vec::new()) });
        let odd = BalancerSpec::new("socks5", "socks5://relay", "odd", 1);
        let p = prober(vec![odd.clone()], transport.clone());

        let report = p.probe(&odd, "https://httpbin.org/json").await;
        assert!(!report.ok);
        assert_eq!(report.description, "odd");
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
