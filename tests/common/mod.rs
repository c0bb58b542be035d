//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{Path as PathParam, Request},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use edge_gateway::config::{Environment, GatewayConfig};
use edge_gateway::database::{Database, DatabaseError, NullDatabase};
use edge_gateway::lifecycle::{LifecycleError, LifecycleState};
use edge_gateway::{routes, GatewayError, Orchestrator, Shutdown, Termination};

pub const ROOT_DOCUMENT: &str = "<!doctype html><title>root</title>";
pub const ADMIN_DOCUMENT: &str = "<!doctype html><title>admin</title>";
pub const STYLESHEET: &str = "body { margin: 0; }";
pub const SECRET: &str = "outside-the-asset-dir";

/// Temporary tree: `<tmp>/public/{index.html,admin.html,style.css}` plus a
/// `<tmp>/secret.txt` that must never be served.
pub struct Assets {
    root: TempDir,
}

impl Assets {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let public = root.path().join("public");
        std::fs::create_dir(&public).unwrap();
        std::fs::write(public.join("index.html"), ROOT_DOCUMENT).unwrap();
        std::fs::write(public.join("admin.html"), ADMIN_DOCUMENT).unwrap();
        std::fs::write(public.join("style.css"), STYLESHEET).unwrap();
        std::fs::write(root.path().join("secret.txt"), SECRET).unwrap();
        Self { root }
    }

    pub fn dir(&self) -> std::path::PathBuf {
        self.root.path().join("public")
    }
}

/// Configuration bound to loopback on an ephemeral port.
pub fn test_config(assets: &Path, environment: Environment) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = environment;
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.assets.dir = assets.to_path_buf();
    config.rate_limit.max_requests = 1_000;
    config
}

/// Delegated routes used by the tests, with a hit counter for `/api/upload`.
pub struct TestRoutes {
    pub router: Router,
    pub uploads: Arc<AtomicUsize>,
}

pub fn test_routes() -> TestRoutes {
    let uploads = Arc::new(AtomicUsize::new(0));
    let counter = uploads.clone();

    let router = routes::api()
        .route(
            "/api/upload",
            post(move |_body: axum::body::Bytes| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "stored"
                }
            }),
        )
        .route("/api/fail", get(fail))
        .route("/api/panic", get(explode))
        .route("/api/slow/{ms}", get(slow));

    TestRoutes { router, uploads }
}

async fn fail() -> Result<&'static str, GatewayError> {
    Err(GatewayError::internal(std::io::Error::other("database exploded")))
}

async fn explode() -> &'static str {
    panic!("handler blew up")
}

async fn slow(PathParam(ms): PathParam<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}

/// Send one request through `app` and decode the body as JSON (Null if it
/// is not JSON).
pub async fn send(app: &Router, request: Request) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, body)
}

/// Like [`send`] but returns the raw body text.
pub async fn send_text(app: &Router, request: Request) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

pub fn get_request(uri: &str) -> Request {
    axum::http::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Backend whose every connect attempt fails.
pub struct FailingDatabase;

#[async_trait]
impl Database for FailingDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::Connect {
            address: "db.invalid:5432".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        })
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Backend that fails the first `failures` connect attempts.
pub struct FlakyDatabase {
    failures: usize,
    attempts: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FlakyDatabase {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for FlakyDatabase {
    async fn connect(&self) -> Result<(), DatabaseError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(DatabaseError::Connect {
                address: "db.invalid:5432".into(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A daemon running in the background.
pub struct RunningDaemon {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub lifecycle: watch::Receiver<LifecycleState>,
    pub in_flight: edge_gateway::lifecycle::inflight::InFlightTracker,
    pub handle: JoinHandle<Result<Termination, LifecycleError>>,
}

/// Start an orchestrator and wait until it is listening.
pub async fn spawn_daemon(
    config: GatewayConfig,
    database: Arc<dyn Database>,
    routes: Router,
) -> RunningDaemon {
    let orchestrator = Orchestrator::new(Arc::new(config), database, routes);
    let mut lifecycle = orchestrator.lifecycle();
    let shutdown = orchestrator.shutdown_handle();
    let in_flight = orchestrator.gateway().in_flight().clone();
    let handle = tokio::spawn(orchestrator.run(std::future::pending::<()>()));

    let addr = {
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            lifecycle.wait_for(|s| matches!(s, LifecycleState::Listening(_))),
        )
        .await
        .expect("daemon did not start listening")
        .expect("lifecycle channel closed");
        match *state {
            LifecycleState::Listening(addr) => addr,
            other => panic!("unexpected state {other:?}"),
        }
    };

    RunningDaemon {
        addr,
        shutdown,
        lifecycle,
        in_flight,
        handle,
    }
}

pub fn null_database() -> Arc<dyn Database> {
    Arc::new(NullDatabase)
}

/// Poll until `condition` holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
