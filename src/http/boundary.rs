//! The request boundary and its interception shim.
//!
//! # Responsibilities
//! - Give the host one place through which all outbound requests pass
//! - When the shim is installed, send blocked targets through the coordinator
//! - Fall back to the direct request when relaying fails
//!
//! # Design Decisions
//! - The shim is an `ArcSwapOption`; install and uninstall are single atomic
//!   swaps and never block in-flight requests
//! - Installing twice keeps the first interceptor
//! - Callers see a relayed response, the direct response, or the direct
//!   request's own failure; relay errors never reach them

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::relay::coordinator::RequestCoordinator;
use crate::relay::error::RelayResult;
use crate::relay::transport::{OutboundRequest, RelayResponse, RequestOptions, Transport};
use crate::routing::classifier::DomainClassifier;

/// Decides per request whether to relay, and relays.
pub struct RelayInterceptor {
    classifier: Arc<DomainClassifier>,
    coordinator: Arc<RequestCoordinator>,
}

impl RelayInterceptor {
    pub fn new(classifier: Arc<DomainClassifier>, coordinator: Arc<RequestCoordinator>) -> Self {
        Self {
            classifier,
            coordinator,
        }
    }

    fn wants(&self, url: &str) -> bool {
        let settings = self.coordinator.settings();
        self.classifier
            .should_relay(url, settings.enabled, settings.restrict_to_known_blocked_hosts)
    }
}

/// Outbound request path with an optional relay shim.
pub struct HttpBoundary {
    direct: Arc<dyn Transport>,
    interceptor: ArcSwapOption<RelayInterceptor>,
}

impl HttpBoundary {
    /// A boundary that sends everything through `direct`.
    pub fn new(direct: Arc<dyn Transport>) -> Self {
        Self {
            direct,
            interceptor: ArcSwapOption::empty(),
        }
    }

    /// Install the shim. Returns false if one was already installed.
    pub fn install(&self, interceptor: RelayInterceptor) -> bool {
        let previous = self
            .interceptor
            .compare_and_swap(&None::<Arc<RelayInterceptor>>, Some(Arc::new(interceptor)));
        let installed = previous.is_none();
        if installed {
            tracing::info!("Request interception installed");
        }
        installed
    }

    /// Restore the direct path. Returns false if nothing was installed.
    pub fn uninstall(&self) -> bool {
        let removed = self.interceptor.swap(None).is_some();
        if removed {
            tracing::info!("Request interception removed");
        }
        removed
    }

    pub fn is_installed(&self) -> bool {
        self.interceptor.load().is_some()
    }

    /// Send a request through the boundary.
    pub async fn fetch(&self, url: &str, options: RequestOptions) -> RelayResult<RelayResponse> {
        if let Some(interceptor) = self.interceptor.load_full() {
            if interceptor.wants(url) {
                match interceptor.coordinator.execute(url, options.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Relay failed, sending request directly");
                    }
                }
            }
        }

        self.direct.send(OutboundRequest::direct(url, &options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use arc_swap::ArcSwap;
    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;

    use crate::config::schema::RelaySettings;
    use crate::load_balancer::balancer::{BalancerKind, BalancerSpec};
    use crate::load_balancer::registry::BalancerRegistry;
    use crate::observability::notices::RecordingNotifier;
    use crate::relay::stats::StatsRecorder;
    use crate::relay::url_builder::ProxyUrlBuilder;
    use crate::security::auth::AuthTable;
    use crate::security::cipher::BuiltinCipherProvider;
    use crate::storage::MemoryStore;

    /// Relays always fail; everything else answers "direct".
    #[derive(Default)]
    struct RelayDown {
        seen: Mutex<Vec<String>>,
    }

    impl Transport for RelayDown {
        fn send(&self, request: OutboundRequest) -> BoxFuture<'_, RelayResult<RelayResponse>> {
            Box::pin(async move {
                let relayed = request.url.starts_with("https://relay/");
                self.seen.lock().unwrap().push(request.url);
                if relayed {
                    Ok(RelayResponse::new(StatusCode::BAD_GATEWAY, ""))
                } else {
                    Ok(RelayResponse::new(StatusCode::OK, "direct"))
                }
            })
        }
    }

    fn interceptor(transport: Arc<RelayDown>) -> RelayInterceptor {
        let coordinator = RequestCoordinator::new(
            Arc::new(BalancerRegistry::with_builtins(
                vec![BalancerSpec::new(BalancerKind::UrlReplace, "https://relay/", "relay", 1)],
                Vec::new(),
            )),
            ProxyUrlBuilder::new(Arc::new(BuiltinCipherProvider)),
            AuthTable::default(),
            Arc::new(ArcSwap::from_pointee(RelaySettings::default())),
            Arc::new(StatsRecorder::load(Arc::new(MemoryStore::new()))),
            transport,
            Arc::new(RecordingNotifier::new()),
        );
        RelayInterceptor::new(Arc::new(DomainClassifier::default()), Arc::new(coordinator))
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let transport = Arc::new(RelayDown::default());
        let boundary = HttpBoundary::new(transport.clone());

        assert!(!boundary.uninstall());
        assert!(boundary.install(interceptor(transport.clone())));
        assert!(!boundary.install(interceptor(transport.clone())));
        assert!(boundary.is_installed());
        assert!(boundary.uninstall());
        assert!(!boundary.is_installed());
        assert!(!boundary.uninstall());
    }

    #[tokio::test]
    async fn test_relay_failure_falls_back_to_direct() {
        let transport = Arc::new(RelayDown::default());
        let boundary = HttpBoundary::new(transport.clone());
        boundary.install(interceptor(transport.clone()));

        let response = boundary
            .fetch("https://hdrezka.tv/x", RequestOptions::get())
            .await
            .unwrap();
        assert_eq!(response.body, "direct");
        assert_eq!(
            *transport.seen.lock().unwrap(),
            vec!["https://relay/https://hdrezka.tv/x", "https://hdrezka.tv/x"]
        );
    }

    #[tokio::test]
    async fn test_unblocked_and_uninstalled_go_direct() {
        let transport = Arc::new(RelayDown::default());
        let boundary = HttpBoundary::new(transport.clone());

        boundary.fetch("https://hdrezka.tv/x", RequestOptions::get()).await.unwrap();
        boundary.install(interceptor(transport.clone()));
        boundary.fetch("https://example.com/", RequestOptions::get()).await.unwrap();

        assert_eq!(
            *transport.seen.lock().unwrap(),
            vec!["https://hdrezka.tv/x", "https://example.com/"]
        );
    }
}
