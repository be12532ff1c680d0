//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use relay_failover::config::RelayConfig;
use relay_failover::engine::{EngineServices, RelayEngine};
use relay_failover::load_balancer::{BalancerKind, BalancerSpec};
use relay_failover::relay::ReqwestTransport;

/// A mock relay (or origin) server that records the request target of every hit.
pub struct MockServer {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Base URL with a trailing slash.
    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Request targets (path + query) seen so far, in arrival order.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

/// Start a programmable server on an ephemeral port. `f` receives the request
/// target and returns the status and body to answer with.
pub async fn start_programmable_server<F, Fut>(f: F) -> MockServer
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        serve_one(socket, f, recorded).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockServer { addr, hits }
}

/// Start a server that always answers `status` with `body`.
pub async fn start_fixed_server(status: u16, body: &'static str) -> MockServer {
    start_programmable_server(move |_| async move { (status, body.to_string()) }).await
}

/// Start a server that waits `delay` before answering 200 with `body`.
pub async fn start_slow_server(delay: Duration, body: &'static str) -> MockServer {
    start_programmable_server(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, body.to_string())
    })
    .await
}

async fn serve_one<F, Fut>(mut socket: TcpStream, f: Arc<F>, recorded: Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (u16, String)>,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    recorded.lock().unwrap().push(target.clone());

    let (status, body) = f(target).await;
    let status_text = match status {
        200 => "200 OK",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

pub fn generic(server: &MockServer, priority: i32) -> BalancerSpec {
    BalancerSpec::new(
        BalancerKind::GenericProxy,
        server.endpoint(),
        format!("generic-{}", priority),
        priority,
    )
}

pub fn url_replace(server: &MockServer, priority: i32) -> BalancerSpec {
    BalancerSpec::new(
        BalancerKind::UrlReplace,
        server.endpoint(),
        format!("replace-{}", priority),
        priority,
    )
}

/// Config with only the given balancers and no built-ins.
pub fn relay_config(balancers: Vec<BalancerSpec>) -> RelayConfig {
    RelayConfig {
        balancers,
        use_builtin_balancers: false,
        ..RelayConfig::default()
    }
}

/// Transport that ignores proxy environment variables.
pub fn test_transport() -> Arc<ReqwestTransport> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    Arc::new(ReqwestTransport::with_client(client))
}

/// Engine over `config` with a real HTTP transport and in-memory state.
pub fn engine(config: &RelayConfig) -> Arc<RelayEngine> {
    RelayEngine::create(
        config,
        EngineServices {
            transport: test_transport(),
            ..EngineServices::default()
        },
    )
}
