//! Router facade.
//!
//! # Responsibilities
//! - Mount the externally owned route handlers at the root
//! - Fall back to static files from the asset directory
//! - Serve the fixed documents and the liveness probe
//! - Answer everything else with the not-found response
//!
//! # Design Decisions
//! - Precedence is expressed as a fallback chain, so each layer only sees
//!   what the previous one declined
//! - Containment inside the asset directory is `ServeDir`'s guarantee;
//!   traversal attempts fall through to not-found
//! - A wrong method on a fixed endpoint is treated as unmatched, not 405

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{FromRef, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::GatewayConfig;
use crate::health;
use crate::http::response::not_found_response;

/// State shared by the facade's own handlers.
#[derive(Debug, Clone)]
pub struct FacadeState {
    pub started_at: Instant,
    pub root_document: Arc<PathBuf>,
    pub admin_document: Arc<PathBuf>,
    pub not_found: Arc<str>,
}

impl FromRef<FacadeState> for Instant {
    fn from_ref(state: &FacadeState) -> Self {
        state.started_at
    }
}

/// Build the facade around the delegated `routes`.
pub fn build_facade(routes: Router, config: &GatewayConfig, started_at: Instant) -> Router {
    let state = FacadeState {
        started_at,
        root_document: Arc::new(config.assets.root_document_path()),
        admin_document: Arc::new(config.assets.admin_document_path()),
        not_found: Arc::from(config.messages.not_found.as_str()),
    };

    let fixed = Router::new()
        .route("/", get(root_document))
        .route("/admin", get(admin_document))
        .route(health::LIVENESS_PATH, get(health::liveness))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state);

    let static_files = ServeDir::new(&config.assets.dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(fixed);

    routes.fallback_service(static_files)
}

async fn root_document(State(state): State<FacadeState>, request: Request) -> Response {
    serve_document(&state.root_document, &state.not_found, request).await
}

async fn admin_document(State(state): State<FacadeState>, request: Request) -> Response {
    serve_document(&state.admin_document, &state.not_found, request).await
}

async fn serve_document(path: &Path, not_found: &str, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => {
            tracing::warn!(path = %path.display(), "Document missing from asset directory");
            not_found_response(not_found)
        }
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

async fn not_found(State(state): State<FacadeState>) -> Response {
    not_found_response(&state.not_found)
}
