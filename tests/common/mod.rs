//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{self, header, HeaderMap, Method, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use foods_api::config::ApiConfig;
use foods_api::data::SqliteStore;
use foods_api::lifecycle::{ShutdownCoordinator, ShutdownError};
use foods_api::ApiServer;

pub const CLIENT: &str = "203.0.113.10:5000";

/// Defaults with a limiter generous enough not to interfere.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.rate_limit.requests_per_second = 1000.0;
    config.rate_limit.burst_size = 1000;
    config
}

pub struct TestApp {
    pub store: Arc<SqliteStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new(config: ApiConfig) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory(Duration::from_secs(3)).unwrap());
        let coordinator = ShutdownCoordinator::new(config.timeouts.shutdown_drain());
        let server = ApiServer::new(config, Arc::clone(&store), coordinator);
        Self {
            store,
            router: server.router(),
        }
    }

    pub async fn token(&self, user_id: i64, permissions: &[&str]) -> String {
        self.store
            .issue_token(
                user_id,
                Duration::from_secs(3600),
                permissions.iter().map(|p| p.to_string()).collect(),
            )
            .await
            .unwrap()
    }

    pub async fn send(&self, request: http::Request<Body>) -> TestResponse {
        send_to(&self.router, request).await
    }
}

/// Drive one request through `router` and decode the JSON body, if any.
pub async fn send_to(router: &Router, request: http::Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Request builder that attaches the peer address the server would see.
pub struct RequestSpec {
    method: Method,
    uri: String,
    peer: SocketAddr,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

pub fn request(method: Method, uri: &str) -> RequestSpec {
    RequestSpec {
        method,
        uri: uri.to_string(),
        peer: CLIENT.parse().unwrap(),
        headers: Vec::new(),
        body: None,
    }
}

impl RequestSpec {
    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(self, body: Value) -> Self {
        self.raw(&body.to_string())
    }

    pub fn raw(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self.header(header::CONTENT_TYPE.as_str(), "application/json")
    }

    pub fn from_peer(mut self, peer: &str) -> Self {
        self.peer = peer.parse().unwrap();
        self
    }

    pub fn build(self) -> http::Request<Body> {
        let mut builder = http::Request::builder().method(self.method).uri(self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let mut request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(self.peer));
        request
    }
}

/// A server running on a real socket.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub store: Arc<SqliteStore>,
    pub coordinator: ShutdownCoordinator,
    pub handle: JoinHandle<Result<(), ShutdownError>>,
}

pub async fn spawn_server(config: ApiConfig) -> RunningServer {
    let store = Arc::new(SqliteStore::open_in_memory(Duration::from_secs(3)).unwrap());
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator = ShutdownCoordinator::new(config.timeouts.shutdown_drain());
    let server = ApiServer::new(config, Arc::clone(&store), coordinator.clone());
    let handle = tokio::spawn(server.run(listener));
    RunningServer {
        addr,
        store,
        coordinator,
        handle,
    }
}
