//! Request coordination: deduplication plus bounded retry with failover.
//!
//! # Responsibilities
//! - Collapse concurrent identical requests into one execution
//! - Walk the balancer rotation, one balancer per attempt
//! - Bound attempts by `min(retry_count, enabled balancers)`
//! - Keep the request/success/error counters
//!
//! # Design Decisions
//! - The dedup check-and-insert is a single `DashMap::entry` call made before
//!   the first await, so two callers can never both start an execution
//! - The execution runs on its own task and publishes through a oneshot; a
//!   caller dropping its future never cancels the run for the others
//! - No backoff: the next attempt goes to a different relay
//! - Exhaustion always reports `AllBalancersFailed` carrying the last error

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::http::header::{ACCEPT, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, Method};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::config::schema::RelaySettings;
use crate::load_balancer::balancer::BalancerSpec;
use crate::load_balancer::registry::BalancerRegistry;
use crate::observability::metrics;
use crate::observability::notices::{NoticeLevel, Notifier};
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::stats::StatsRecorder;
use crate::relay::transport::{OutboundRequest, RelayResponse, RequestOptions, Transport};
use crate::relay::url_builder::ProxyUrlBuilder;
use crate::resilience::with_deadline;
use crate::security::auth::AuthTable;

/// Outcome shared by every caller of one logical request.
pub type RelayOutcome = RelayResult<RelayResponse>;

type SharedOutcome = Shared<BoxFuture<'static, RelayOutcome>>;

/// Removes a pending entry when the execution task ends, including by panic.
struct PendingGuard {
    coordinator: Arc<RequestCoordinator>,
    key: RequestKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.coordinator.pending.remove(&self.key);
    }
}

const USER_AGENT_VALUE: &str = concat!("relay-failover/", env!("CARGO_PKG_VERSION"));

/// Per-attempt logs go to info when `debug_logging` is on, debug otherwise.
macro_rules! attempt_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Identity of a logical request for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }
}

/// Runs logical relay requests against the balancer rotation.
pub struct RequestCoordinator {
    registry: Arc<BalancerRegistry>,
    builder: ProxyUrlBuilder,
    auth: ArcSwap<AuthTable>,
    settings: Arc<ArcSwap<RelaySettings>>,
    stats: Arc<StatsRecorder>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    pending: DashMap<RequestKey, SharedOutcome>,
}

impl RequestCoordinator {
    pub fn new(
        registry: Arc<BalancerRegistry>,
        builder: ProxyUrlBuilder,
        auth: AuthTable,
        settings: Arc<ArcSwap<RelaySettings>>,
        stats: Arc<StatsRecorder>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            builder,
            auth: ArcSwap::from_pointee(auth),
            settings,
            stats,
            transport,
            notifier,
            pending: DashMap::new(),
        }
    }

    /// Relay `url`, attaching to an identical in-flight request if one exists.
    pub async fn execute(self: &Arc<Self>, url: &str, options: RequestOptions) -> RelayOutcome {
        Url::parse(url).map_err(|e| {
            debug!(url = %url, error = %e, "Refusing to relay malformed URL");
            RelayError::MalformedUrl(url.to_string())
        })?;

        let key = RequestKey::new(options.method(), url);
        let shared = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(method = %key.method, url = %key.url, "Request already in flight, attaching");
                entry.get().clone()
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel::<RelayOutcome>();
                let shared = async move { rx.await.unwrap_or(Err(RelayError::Aborted)) }
                    .boxed()
                    .shared();
                slot.insert(shared.clone());
                self.spawn_execution(key, options, tx);
                shared
            }
        };

        shared.await
    }

    fn spawn_execution(
        self: &Arc<Self>,
        key: RequestKey,
        options: RequestOptions,
        tx: oneshot::Sender<RelayOutcome>,
    ) {
        let coordinator = Arc::clone(self);
        let request_id = Uuid::new_v4();
        let span = info_span!("relay", %request_id, method = %key.method, url = %key.url);

        tokio::spawn(
            async move {
                let guard = PendingGuard {
                    coordinator: Arc::clone(&coordinator),
                    key,
                };
                let outcome = coordinator.run(&guard.key.url, &options).await;
                drop(guard);
                // Every caller may have gone away; nothing to do then.
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );
    }

    /// The bounded retry loop for one logical request.
    async fn run(&self, url: &str, options: &RequestOptions) -> RelayOutcome {
        let settings = self.settings.load_full();
        let enabled = self.registry.enabled_count();
        let max_attempts = (settings.retry_count as usize).min(enabled) as u32;
        if max_attempts == 0 {
            warn!(enabled, retry_count = settings.retry_count, "No active balancers available");
            return Err(RelayError::NoBalancersAvailable);
        }

        self.stats.record_request();

        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            let balancer = match self.registry.current() {
                Ok(balancer) => balancer,
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            };
            attempts = attempt;

            attempt_log!(
                settings.debug_logging,
                attempt,
                max_attempts,
                balancer = %balancer.label(),
                "Relaying request"
            );

            let started = Instant::now();
            match self.attempt(url, options, &balancer, &settings).await {
                Ok(response) => {
                    metrics::record_attempt(balancer.label(), true, started);
                    self.stats.record_success(balancer.label());
                    attempt_log!(
                        settings.debug_logging,
                        attempt,
                        balancer = %balancer.label(),
                        status = response.status.as_u16(),
                        "Relay succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    metrics::record_attempt(balancer.label(), false, started);
                    attempt_log!(
                        settings.debug_logging,
                        attempt,
                        balancer = %balancer.label(),
                        error = %e,
                        "Balancer failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }

                    if settings.auto_rotate_on_failure && attempt < max_attempts {
                        self.rotate();
                    }
                }
            }
        }

        self.stats.record_error();
        let error = RelayError::AllBalancersFailed {
            attempts,
            last_error: last_error.map(Box::new),
        };
        warn!(error = %error, "Relay exhausted");
        Err(error)
    }

    async fn attempt(
        &self,
        url: &str,
        options: &RequestOptions,
        balancer: &BalancerSpec,
        settings: &RelaySettings,
    ) -> RelayOutcome {
        let target = self.builder.build(url, balancer, settings).await?;

        let request = OutboundRequest {
            method: options.method(),
            url: target.url,
            headers: self.headers_for(url, &options.headers),
            body: options.body.clone(),
        };

        let deadline = Duration::from_millis(settings.timeout_ms);
        let response = with_deadline(deadline, self.transport.send(request)).await?;

        if response.status.is_success() {
            Ok(response)
        } else {
            Err(RelayError::NonSuccessStatus(response.status))
        }
    }

    /// Identifying headers, then auth, then the caller's own headers.
    fn headers_for(&self, url: &str, caller: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.extend(self.auth.load().headers_for(url));

        for name in caller.keys() {
            headers.remove(name);
        }
        for (name, value) in caller {
            headers.append(name.clone(), value.clone());
        }
        headers
    }

    /// Move to the next balancer and announce it.
    pub fn rotate(&self) -> Option<BalancerSpec> {
        let next = self.registry.advance()?;
        info!(balancer = %next.label(), "Switched balancer");
        if self.settings.load().show_notifications {
            self.notifier.show(
                &format!("Switched to balancer: {}", next.label()),
                NoticeLevel::Warning,
            );
        }
        Some(next)
    }

    /// Replace the credential table.
    pub fn set_auth(&self, auth: AuthTable) {
        self.auth.store(Arc::new(auth));
    }

    pub fn auth(&self) -> Arc<AuthTable> {
        self.auth.load_full()
    }

    /// Settings in effect right now.
    pub fn settings(&self) -> Arc<RelaySettings> {
        self.settings.load_full()
    }

    pub fn registry(&self) -> &Arc<BalancerRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<StatsRecorder> {
        &self.stats
    }

    /// Underlying transport, also used for direct fallbacks and probes.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of logical requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
