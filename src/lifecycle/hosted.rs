//! Hosted-mode (per-invocation) entry point.
//!
//! # Responsibilities
//! - Run one request through the pipeline per invocation
//! - Establish the backend connection lazily, retrying on later invocations
//! - Turn a failed connection into an error response instead of an exit
//! - Translate JSON invocation events to requests and back
//!
//! Nothing here binds a socket, installs a signal handler or exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tower::ServiceExt;

use crate::config::GatewayConfig;
use crate::database::Database;
use crate::error::GatewayError;
use crate::health;
use crate::http::request::DependencyFault;
use crate::http::response::ErrorPayload;
use crate::http::server::Gateway;

/// Pipeline stage that fails requests flagged with a [`DependencyFault`].
///
/// The liveness probe passes through regardless.
pub async fn dependency_gate(request: Request, next: Next) -> Response {
    if request.uri().path() != health::LIVENESS_PATH {
        if let Some(DependencyFault(reason)) = request.extensions().get::<DependencyFault>() {
            return GatewayError::DependencyUnavailable(reason.to_string()).into_response();
        }
    }
    next.run(request).await
}

/// Handles invocations for a host that owns the process.
pub struct HostedGateway {
    database: Arc<dyn Database>,
    connected: OnceCell<()>,
    gateway: Gateway,
    app: Router,
}

impl HostedGateway {
    pub fn new(config: Arc<GatewayConfig>, database: Arc<dyn Database>, routes: Router) -> Self {
        let gateway = Gateway::new(config);
        let app = gateway.assemble(routes);
        Self {
            database,
            connected: OnceCell::new(),
            gateway,
            app,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Whether an earlier invocation established the backend connection.
    pub fn is_connected(&self) -> bool {
        self.connected.initialized()
    }

    /// Run one request through the pipeline. Never fails; every outcome is
    /// a response.
    pub async fn handle(&self, mut request: Request) -> Response {
        let connected = self
            .connected
            .get_or_try_init(|| async { self.database.connect().await })
            .await;
        if let Err(e) = connected {
            tracing::warn!(error = %e, "Persistence backend unavailable for this invocation");
            request
                .extensions_mut()
                .insert(DependencyFault(Arc::from(e.to_string())));
        }

        match self.app.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Handle a JSON invocation event.
    pub async fn invoke(&self, event: InvocationEvent) -> InvocationResult {
        let request = match event.into_request() {
            Ok(request) => request,
            Err(reason) => {
                tracing::warn!(error = %reason, "Rejected malformed invocation event");
                return InvocationResult::rejected(&reason);
            }
        };
        let response = self.handle(request).await;
        InvocationResult::from_response(response).await
    }
}

/// A request as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default = "default_method")]
    pub method: String,
    /// Path and optional query string.
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl InvocationEvent {
    fn into_request(self) -> Result<Request, String> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| format!("invalid method {:?}", self.method))?;
        let mut builder = axum::http::Request::builder().method(method).uri(self.path.as_str());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header {name}"))?;
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(self.body.unwrap_or_default()))
            .map_err(|e| format!("invalid request: {e}"))
    }
}

/// The response handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InvocationResult {
    async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        match to_bytes(body, usize::MAX).await {
            Ok(bytes) => Self {
                status: parts.status.as_u16(),
                headers,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to collect response body");
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    /// Result for an event that could not be turned into a request.
    pub fn rejected(reason: &str) -> Self {
        Self::error(StatusCode::BAD_REQUEST, reason)
    }

    fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_string(&ErrorPayload::redacted(message))
            .unwrap_or_else(|_| r#"{"success":false}"#.to_string());
        Self {
            status: status.as_u16(),
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body,
        }
    }
}
