//! Request/response types and the underlying transport.
//!
//! # Responsibilities
//! - Describe one outbound request (method, URL, headers, optional body)
//! - Carry a fully buffered response that can be shared between callers
//! - Abstract the network behind the `Transport` trait
//!
//! # Design Decisions
//! - Responses are buffered (`Bytes`) so deduplicated callers can each get a copy
//! - Deadlines are applied by the caller, not by the transport

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;

use crate::relay::error::{RelayError, RelayResult};

/// Caller-supplied request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (GET when `None`).
    pub method: Option<Method>,
    /// Caller headers. These win over engine headers on collision.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl RequestOptions {
    /// Options for a plain GET.
    pub fn get() -> Self {
        Self::default()
    }

    /// Options with an explicit method.
    pub fn with_method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    /// Effective method.
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }
}

/// A concrete request handed to a transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// The request a caller would have sent without any relay involved.
    pub fn direct(url: &str, options: &RequestOptions) -> Self {
        Self {
            method: options.method(),
            url: url.to_string(),
            headers: options.headers.clone(),
            body: options.body.clone(),
        }
    }
}

/// A buffered response. Status, headers and body pass through unmodified.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RelayResponse {
    /// Shorthand for a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// The network call the engine sits in front of.
pub trait Transport: Send + Sync {
    /// Send a request and buffer the full response.
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, RelayResult<RelayResponse>>;
}

/// Transport backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, RelayResult<RelayResponse>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, &request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| RelayError::Transport(e.to_string()))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| RelayError::Transport(format!("reading body: {}", e)))?;

            Ok(RelayResponse { status, headers, body })
        })
    }
}
