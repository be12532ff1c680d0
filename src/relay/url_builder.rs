//! Relay URL construction.
//!
//! # Responsibilities
//! - Turn (target URL, balancer) into the URL actually sent to the relay
//! - Encrypt worker payloads unless simple mode is on
//!
//! # Design Decisions
//! - One `UrlStrategy` per balancer kind; `BalancerKind::strategy` is the only
//!   place that maps kinds to strategies
//! - Encryption failure degrades to the plain `url` parameter for that call
//! - The cipher is loaded once and shared; failed loads are retried next time

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::schema::RelaySettings;
use crate::load_balancer::balancer::{BalancerKind, BalancerSpec};
use crate::relay::error::{RelayError, RelayResult};
use crate::security::cipher::{Cipher, CipherError, CipherProvider};

/// The URL to request from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub url: String,
    /// Whether the target travels encrypted.
    pub encrypted: bool,
}

impl ProxyTarget {
    fn plain(url: String) -> Self {
        Self { url, encrypted: false }
    }
}

/// Inputs shared by all strategies for one build.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub settings: &'a RelaySettings,
    pub ciphers: &'a CipherCache,
}

/// URL construction for one balancer kind.
pub trait UrlStrategy: Send + Sync {
    fn build<'a>(
        &'a self,
        target: &'a str,
        endpoint: &'a str,
        ctx: BuildContext<'a>,
    ) -> BoxFuture<'a, ProxyTarget>;
}

/// `endpoint?url=<encoded>` (or `&url=` when the endpoint has a query).
#[derive(Debug, Default)]
pub struct QueryParamStrategy;

/// `endpoint` followed by the raw target.
#[derive(Debug, Default)]
pub struct PathAppendStrategy;

/// Encrypted `data` parameter, or `url` in simple mode.
#[derive(Debug, Default)]
pub struct WorkerStrategy;

static QUERY_PARAM: QueryParamStrategy = QueryParamStrategy;
static PATH_APPEND: PathAppendStrategy = PathAppendStrategy;
static WORKER: WorkerStrategy = WorkerStrategy;

impl BalancerKind {
    /// Strategy for this kind. `None` for unsupported kinds.
    pub fn strategy(&self) -> Option<&'static dyn UrlStrategy> {
        match self {
            BalancerKind::CloudflareWorker => Some(&WORKER),
            BalancerKind::GenericProxy => Some(&QUERY_PARAM),
            BalancerKind::UrlReplace => Some(&PATH_APPEND),
            BalancerKind::Unsupported(_) => None,
        }
    }
}

/// Append `name=<encoded value>` to `endpoint`.
fn with_query(endpoint: &str, name: &str, value: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", endpoint, separator, name, urlencoding::encode(value))
}

impl UrlStrategy for QueryParamStrategy {
    fn build<'a>(
        &'a self,
        target: &'a str,
        endpoint: &'a str,
        _ctx: BuildContext<'a>,
    ) -> BoxFuture<'a, ProxyTarget> {
        Box::pin(async move { ProxyTarget::plain(with_query(endpoint, "url", target)) })
    }
}

impl UrlStrategy for PathAppendStrategy {
    fn build<'a>(
        &'a self,
        target: &'a str,
        endpoint: &'a str,
        _ctx: BuildContext<'a>,
    ) -> BoxFuture<'a, ProxyTarget> {
        Box::pin(async move { ProxyTarget::plain(format!("{}{}", endpoint, target)) })
    }
}

#[derive(Serialize)]
struct WorkerPayload<'a> {
    url: &'a str,
    timestamp: u64,
}

impl WorkerStrategy {
    async fn encrypted(
        target: &str,
        endpoint: &str,
        ctx: BuildContext<'_>,
    ) -> RelayResult<ProxyTarget> {
        let cipher = ctx
            .ciphers
            .get()
            .await
            .map_err(|e| RelayError::EncryptionUnavailable(e.to_string()))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let payload = serde_json::to_string(&WorkerPayload { url: target, timestamp })
            .map_err(|e| RelayError::EncryptionUnavailable(e.to_string()))?;

        let data = cipher
            .encrypt(&payload, &ctx.settings.encryption_key)
            .map_err(|e| RelayError::EncryptionUnavailable(e.to_string()))?;

        Ok(ProxyTarget {
            url: with_query(endpoint, "data", &data),
            encrypted: true,
        })
    }
}

impl UrlStrategy for WorkerStrategy {
    fn build<'a>(
        &'a self,
        target: &'a str,
        endpoint: &'a str,
        ctx: BuildContext<'a>,
    ) -> BoxFuture<'a, ProxyTarget> {
        Box::pin(async move {
            if ctx.settings.simple_mode {
                return ProxyTarget::plain(with_query(endpoint, "url", target));
            }
            match Self::encrypted(target, endpoint, ctx).await {
                Ok(built) => built,
                Err(e) => {
                    tracing::warn!(error = %e, "Encryption failed, falling back to simple mode");
                    ProxyTarget::plain(with_query(endpoint, "url", target))
                }
            }
        })
    }
}

/// Lazily loaded cipher shared by all builds.
pub struct CipherCache {
    provider: Arc<dyn CipherProvider>,
    cipher: OnceCell<Arc<dyn Cipher>>,
}

impl CipherCache {
    pub fn new(provider: Arc<dyn CipherProvider>) -> Self {
        Self {
            provider,
            cipher: OnceCell::new(),
        }
    }

    /// The cipher, loading it on first use.
    pub async fn get(&self) -> Result<Arc<dyn Cipher>, CipherError> {
        let cipher = self
            .cipher
            .get_or_try_init(|| async {
                let loaded = self.provider.load().await?;
                tracing::debug!("Cipher loaded");
                Ok::<_, CipherError>(loaded)
            })
            .await?;
        Ok(Arc::clone(cipher))
    }
}

/// Builds relay URLs for any balancer kind. Clones share one cipher cache.
#[derive(Clone)]
pub struct ProxyUrlBuilder {
    ciphers: Arc<CipherCache>,
}

impl ProxyUrlBuilder {
    pub fn new(provider: Arc<dyn CipherProvider>) -> Self {
        Self {
            ciphers: Arc::new(CipherCache::new(provider)),
        }
    }

    /// URL to send to `balancer` for `target`.
    pub async fn build(
        &self,
        target: &str,
        balancer: &BalancerSpec,
        settings: &RelaySettings,
    ) -> RelayResult<ProxyTarget> {
        let strategy = balancer
            .kind
            .strategy()
            .ok_or_else(|| RelayError::UnsupportedBalancerKind(balancer.kind.to_string()))?;

        let ctx = BuildContext {
            settings,
            ciphers: &self.ciphers,
        };
        Ok(strategy.build(target, &balancer.endpoint, ctx).await)
    }
}
