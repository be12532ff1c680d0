//! The relay engine: one explicitly constructed owner of all relay state.
//!
//! # Responsibilities
//! - Load settings, balancers, credentials and counters from the store
//! - Wire the classifier, registry, coordinator, prober and boundary together
//! - Install or remove the interception shim as `enabled` changes
//! - Expose the control surface used by the host and the admin API

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::{AuthRule, RelayConfig, RelaySettings, SettingsPatch};
use crate::health::prober::{HealthProber, ProbeReport};
use crate::http::boundary::{HttpBoundary, RelayInterceptor};
use crate::load_balancer::balancer::{builtin_balancers, BalancerSpec};
use crate::load_balancer::registry::BalancerRegistry;
use crate::observability::notices::{LogNotifier, NoticeLevel, Notifier};
use crate::relay::coordinator::{RelayOutcome, RequestCoordinator};
use crate::relay::stats::{RelayStats, StatsRecorder};
use crate::relay::transport::{ReqwestTransport, RequestOptions, Transport};
use crate::relay::url_builder::ProxyUrlBuilder;
use crate::routing::classifier::DomainClassifier;
use crate::security::auth::AuthTable;
use crate::security::cipher::{BuiltinCipherProvider, CipherProvider};
use crate::storage::{self, KeyValueStore, MemoryStore, AUTH_KEY, BALANCERS_KEY, SETTINGS_KEY};

/// Capabilities the engine consumes.
pub struct EngineServices {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn Notifier>,
    pub ciphers: Arc<dyn CipherProvider>,
}

impl Default for EngineServices {
    fn default() -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new()),
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(LogNotifier),
            ciphers: Arc::new(BuiltinCipherProvider),
        }
    }
}

pub struct RelayEngine {
    settings: Arc<ArcSwap<RelaySettings>>,
    classifier: Arc<DomainClassifier>,
    registry: Arc<BalancerRegistry>,
    coordinator: Arc<RequestCoordinator>,
    prober: Arc<HealthProber>,
    boundary: Arc<HttpBoundary>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    // Target relayed by balancer tests, from `[health] test_url`.
    test_url: String,
    ready: AtomicBool,
}

impl RelayEngine {
    /// Build the engine from `config` and stored state, installing the shim
    /// when relaying is enabled.
    pub fn create(config: &RelayConfig, services: EngineServices) -> Arc<Self> {
        let EngineServices {
            transport,
            store,
            notifier,
            ciphers,
        } = services;

        let settings: RelaySettings =
            storage::load_or(store.as_ref(), SETTINGS_KEY, config.settings.clone());
        let custom: Vec<BalancerSpec> =
            storage::load_or(store.as_ref(), BALANCERS_KEY, config.balancers.clone());
        let auth: Vec<AuthRule> = storage::load_or(store.as_ref(), AUTH_KEY, config.auth.clone());

        // Seed the store so later edits start from what is in effect now.
        storage::save(store.as_ref(), SETTINGS_KEY, &settings);
        storage::save(store.as_ref(), BALANCERS_KEY, &custom);
        storage::save(store.as_ref(), AUTH_KEY, &auth);

        let builtin = if config.use_builtin_balancers {
            builtin_balancers()
        } else {
            Vec::new()
        };
        let registry = Arc::new(BalancerRegistry::with_builtins(builtin, custom));
        let settings = Arc::new(ArcSwap::from_pointee(settings));
        let stats = Arc::new(StatsRecorder::load(Arc::clone(&store)));
        let builder = ProxyUrlBuilder::new(ciphers);

        let coordinator = Arc::new(RequestCoordinator::new(
            Arc::clone(&registry),
            builder.clone(),
            AuthTable::new(auth),
            Arc::clone(&settings),
            stats,
            Arc::clone(&transport),
            Arc::clone(&notifier),
        ));
        let prober = Arc::new(HealthProber::new(
            Arc::clone(&registry),
            builder,
            Arc::clone(&transport),
            Arc::clone(&settings),
        ));

        let engine = Arc::new(Self {
            settings,
            classifier: Arc::new(DomainClassifier::new(
                &config.blocked_domains,
                config.page_host.clone(),
            )),
            registry,
            coordinator,
            prober,
            boundary: Arc::new(HttpBoundary::new(transport)),
            store,
            notifier,
            test_url: config.health.test_url.clone(),
            ready: AtomicBool::new(false),
        });

        if engine.settings.load().enabled {
            engine.install();
        }
        engine.ready.store(true, Ordering::SeqCst);

        tracing::info!(
            balancers = engine.registry.enabled_count(),
            enabled = engine.settings.load().enabled,
            "Relay engine initialized"
        );
        engine.notify("Relay engine initialized", NoticeLevel::Info);
        engine
    }

    fn notify(&self, message: &str, level: NoticeLevel) {
        if self.settings.load().show_notifications {
            self.notifier.show(message, level);
        }
    }

    /// Whether relaying is switched on and the engine is live.
    pub fn is_enabled(&self) -> bool {
        self.settings.load().enabled && self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> RelaySettings {
        RelaySettings::clone(&self.settings.load())
    }

    /// Merge `patch` into the settings, persist them, and follow a change of
    /// `enabled` by installing or removing the shim.
    pub fn update_settings(&self, patch: &SettingsPatch) -> RelaySettings {
        let previous = self.settings.load_full();
        let next = previous.merged(patch);
        self.settings.store(Arc::new(next.clone()));
        storage::save(self.store.as_ref(), SETTINGS_KEY, &next);
        tracing::info!(
            enabled = next.enabled,
            retry_count = next.retry_count,
            timeout_ms = next.timeout_ms,
            "Settings updated"
        );

        if previous.enabled != next.enabled && self.is_ready() {
            if next.enabled {
                self.install();
            } else {
                self.uninstall();
            }
        }
        next
    }

    /// Enabled balancers in rotation order.
    pub fn balancers(&self) -> Vec<BalancerSpec> {
        self.registry.effective_balancers()
    }

    /// User-defined balancers, disabled ones included.
    pub fn custom_balancers(&self) -> Vec<BalancerSpec> {
        Vec::clone(&self.registry.custom_balancers())
    }

    /// Replace and persist the user-defined balancers.
    pub fn set_custom_balancers(&self, balancers: Vec<BalancerSpec>) {
        storage::save(self.store.as_ref(), BALANCERS_KEY, &balancers);
        self.registry.set_custom_balancers(balancers);
    }

    /// Replace and persist the credential table.
    pub fn set_auth_rules(&self, rules: Vec<AuthRule>) {
        storage::save(self.store.as_ref(), AUTH_KEY, &rules);
        self.coordinator.set_auth(AuthTable::new(rules));
    }

    pub fn auth_rules(&self) -> Vec<AuthRule> {
        self.coordinator.auth().rules().to_vec()
    }

    pub fn current_balancer(&self) -> Option<BalancerSpec> {
        self.registry.current().ok()
    }

    /// Rotate to the next balancer. `None` when there is nothing to rotate to.
    pub fn switch_balancer(&self) -> Option<BalancerSpec> {
        self.coordinator.rotate()
    }

    /// Probe one balancer, against `test_url` or the configured probe target.
    pub async fn test_balancer(&self, balancer: &BalancerSpec, test_url: Option<&str>) -> ProbeReport {
        self.prober
            .probe(balancer, test_url.unwrap_or(&self.test_url))
            .await
    }

    /// Probe every enabled balancer in order against the configured target.
    pub async fn test_all_balancers(&self) -> Vec<ProbeReport> {
        self.prober.probe_all(&self.test_url).await
    }

    pub fn prober(&self) -> Arc<HealthProber> {
        Arc::clone(&self.prober)
    }

    pub fn stats(&self) -> RelayStats {
        self.coordinator.stats().snapshot()
    }

    pub fn reset_stats(&self) {
        self.coordinator.stats().reset();
        tracing::info!("Stats reset");
        self.notify("Statistics reset", NoticeLevel::Info);
    }

    /// Relay `url` directly through the coordinator, bypassing the classifier.
    pub async fn execute(&self, url: &str, options: RequestOptions) -> RelayOutcome {
        self.coordinator.execute(url, options).await
    }

    /// Whether `url` would be relayed under the current settings.
    pub fn is_blocked(&self, url: &str) -> bool {
        let settings = self.settings.load();
        self.classifier
            .should_relay(url, settings.enabled, settings.restrict_to_known_blocked_hosts)
    }

    /// The outbound request path the host sends everything through.
    pub fn boundary(&self) -> Arc<HttpBoundary> {
        Arc::clone(&self.boundary)
    }

    /// Install the interception shim. No-op when already installed.
    pub fn install(&self) {
        let interceptor =
            RelayInterceptor::new(Arc::clone(&self.classifier), Arc::clone(&self.coordinator));
        if self.boundary.install(interceptor) {
            self.notify("Request interception enabled", NoticeLevel::Info);
        }
    }

    /// Remove the interception shim. No-op when not installed.
    pub fn uninstall(&self) {
        if self.boundary.uninstall() {
            self.notify("Request interception disabled", NoticeLevel::Info);
        }
    }

    /// Remove the shim and mark the engine as no longer live.
    pub fn dispose(&self) {
        self.uninstall();
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("Relay engine disposed");
    }
}
