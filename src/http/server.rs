//! Host forward proxy.
//!
//! # Responsibilities
//! - Accept plain-HTTP proxy requests (absolute-form or origin-form)
//! - Buffer the request and hand it to the engine's request boundary
//! - Return the relayed or direct response unmodified
//!
//! # Design Decisions
//! - Every request goes through `HttpBoundary::fetch`, so the shim decides
//! - CONNECT tunnels are refused; only plain HTTP is proxied
//! - Hop-by-hop headers are stripped in both directions

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::ListenerConfig;
use crate::engine::RelayEngine;
use crate::http::request::{request_id_middleware, RequestId};
use crate::relay::transport::{RelayResponse, RequestOptions};

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct ProxyState {
    pub engine: Arc<RelayEngine>,
    pub max_body_bytes: usize,
}

/// HTTP forward proxy in front of the relay engine.
pub struct ProxyServer {
    router: Router,
}

impl ProxyServer {
    pub fn new(engine: Arc<RelayEngine>, config: &ListenerConfig) -> Self {
        let state = ProxyState {
            engine,
            max_body_bytes: config.max_body_bytes,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, state: ProxyState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Proxy server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    if request.method() == Method::CONNECT {
        return (StatusCode::METHOD_NOT_ALLOWED, "CONNECT tunnels are not supported").into_response();
    }

    let Some(target) = target_url(&request) else {
        tracing::warn!(request_id = %request_id, uri = %request.uri(), "Cannot determine target");
        return (StatusCode::BAD_REQUEST, "Missing absolute URI or Host header").into_response();
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request body rejected");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    tracing::debug!(request_id = %request_id, method = %parts.method, target = %target, "Proxying request");

    let options = RequestOptions {
        method: Some(parts.method),
        headers: forwardable_headers(&parts.headers),
        body: (!body.is_empty()).then_some(body),
    };

    match state.engine.boundary().fetch(&target, options).await {
        Ok(response) => into_response(response),
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Absolute request URI, or `http://<Host><path>` for origin-form requests.
fn target_url(request: &Request<Body>) -> Option<String> {
    let uri = request.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Some(uri.to_string());
    }

    let host = request.headers().get(header::HOST)?.to_str().ok()?;
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    Some(format!("http://{}{}", host, path))
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(*name);
    }
    out
}

fn into_response(relayed: RelayResponse) -> Response {
    let mut headers = strip_hop_by_hop(&relayed.headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut response = Response::new(Body::from(relayed.body));
    *response.status_mut() = relayed.status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_target_from_absolute_uri() {
        let request = Request::builder()
            .uri("http://hdrezka.tv/films?page=2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(target_url(&request).as_deref(), Some("http://hdrezka.tv/films?page=2"));
    }

    #[test]
    fn test_target_from_host_header() {
        let request = Request::builder()
            .uri("/watch?v=1")
            .header(header::HOST, "youtube.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(target_url(&request).as_deref(), Some("http://youtube.com/watch?v=1"));

        let hostless = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert!(target_url(&hostless).is_none());
    }

    #[test]
    fn test_hop_by_hop_headers_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("proxy-authorization", HeaderValue::from_static("Basic x"));
        headers.insert(header::HOST, HeaderValue::from_static("hdrezka.tv"));
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1"));

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[header::COOKIE], "a=1");
    }
}
