//! Pipeline assembly and the daemon-mode HTTP server.
//!
//! # Responsibilities
//! - Declare the middleware order once, as data ([`PIPELINE`])
//! - Turn each [`Stage`] into its tower/axum layer
//! - Wrap the router facade in the resulting stack
//! - Serve the stack on a listener until shutdown
//!
//! # Stage order (outermost first)
//! ```text
//! RequestId → AccessLog → InFlight → ErrorNormalizer → SecurityHeaders
//!   → Cors → BodyLimit → RateLimit → DependencyGate → PanicGuard
//!   → router facade
//! ```

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::DefaultBodyLimit, middleware, response::Response, Router};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{Level, Span};

use crate::config::GatewayConfig;
use crate::http::request::MakeGatewayRequestId;
use crate::http::response::{normalize_errors, panic_response, ErrorPolicy};
use crate::lifecycle::hosted::dependency_gate;
use crate::lifecycle::inflight::{track_in_flight, InFlightTracker};
use crate::observability::metrics;
use crate::routing::build_facade;
use crate::security::{
    cors::create_cors_layer,
    headers::security_headers,
    limits::enforce_body_limit,
    rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter},
};

/// One step of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Assign `x-request-id` and echo it on the response.
    RequestId,
    /// One log line per request with the final status.
    AccessLog,
    /// Count requests for drain reporting.
    InFlight,
    /// Render every error report as the JSON error shape.
    ErrorNormalizer,
    /// Fixed security headers, CSP included.
    SecurityHeaders,
    /// Cross-origin policy, preflight answered here.
    Cors,
    /// Reject oversized bodies before anything reads them.
    BodyLimit,
    /// Fixed-window limit on the API prefix.
    RateLimit,
    /// Fail the request if the hosted invocation has no backend.
    DependencyGate,
    /// Turn handler panics into error reports.
    PanicGuard,
}

/// The pipeline, outermost stage first.
pub const PIPELINE: [Stage; 10] = [
    Stage::RequestId,
    Stage::AccessLog,
    Stage::InFlight,
    Stage::ErrorNormalizer,
    Stage::SecurityHeaders,
    Stage::Cors,
    Stage::BodyLimit,
    Stage::RateLimit,
    Stage::DependencyGate,
    Stage::PanicGuard,
];

/// Position of `stage` in [`PIPELINE`].
pub fn position(stage: Stage) -> usize {
    PIPELINE
        .iter()
        .position(|s| *s == stage)
        .unwrap_or(PIPELINE.len())
}

impl Stage {
    /// Wrap `router` in this stage's layer.
    fn apply(self, router: Router, gateway: &Gateway) -> Router {
        let config = &gateway.config;
        match self {
            Stage::RequestId => router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetRequestIdLayer::x_request_id(MakeGatewayRequestId)),
            Stage::AccessLog => {
                let verbose = config.environment.is_development();
                router.layer(
                    TraceLayer::new_for_http()
                        .make_span_with(
                            DefaultMakeSpan::new()
                                .level(Level::INFO)
                                .include_headers(verbose),
                        )
                        .on_request(())
                        .on_response(move |response: &Response, latency: Duration, _span: &Span| {
                            access_log(verbose, response, latency)
                        })
                        .on_failure(()),
                )
            }
            Stage::InFlight => router.layer(middleware::from_fn_with_state(
                gateway.in_flight.clone(),
                track_in_flight,
            )),
            Stage::ErrorNormalizer => router.layer(middleware::from_fn_with_state(
                ErrorPolicy::new(config.environment, config.messages.internal_error.as_str()),
                normalize_errors,
            )),
            Stage::SecurityHeaders => router.layer(middleware::from_fn(security_headers)),
            Stage::Cors => router.layer(create_cors_layer(&config.cors)),
            Stage::BodyLimit => router
                .layer(DefaultBodyLimit::max(config.body.max_bytes))
                .layer(middleware::from_fn_with_state(
                    config.body.max_bytes,
                    enforce_body_limit,
                )),
            Stage::RateLimit if config.rate_limit.enabled => {
                router.layer(middleware::from_fn_with_state(
                    RateLimitState::new(
                        gateway.limiter.clone(),
                        &config.rate_limit,
                        &config.messages.rate_limited,
                    ),
                    rate_limit_middleware,
                ))
            }
            Stage::RateLimit => router,
            Stage::DependencyGate => router.layer(middleware::from_fn(dependency_gate)),
            Stage::PanicGuard => router.layer(CatchPanicLayer::custom(panic_response)),
        }
    }
}

fn access_log(verbose: bool, response: &Response, latency: Duration) {
    let status = response.status().as_u16();
    metrics::record_request(status, latency);
    if verbose {
        tracing::info!(
            status,
            latency_ms = latency.as_secs_f64() * 1000.0,
            response_headers = ?response.headers(),
            "request completed"
        );
    } else {
        tracing::info!(
            status,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
    }
}

/// Owns everything the pipeline shares across requests.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    limiter: Arc<RateLimiter>,
    in_flight: InFlightTracker,
    started_at: Instant,
}

impl Gateway {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Self {
            config,
            limiter,
            in_flight: InFlightTracker::new(),
            started_at: Instant::now(),
        }
    }

    /// Wrap the delegated `routes` in the facade and the full pipeline.
    pub fn assemble(&self, routes: Router) -> Router {
        let facade = build_facade(routes, &self.config, self.started_at);
        PIPELINE
            .iter()
            .rev()
            .fold(facade, |router, stage| stage.apply(router, self))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    /// Periodically drop expired rate-limit windows until `shutdown` resolves.
    pub fn spawn_rate_limit_purge<F>(&self, shutdown: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let limiter = self.limiter.clone();
        let period = Duration::from_secs(self.config.rate_limit.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = limiter.purge_expired(Instant::now());
                        if purged > 0 {
                            tracing::debug!(purged, tracked = limiter.tracked_clients(), "Purged expired rate limit windows");
                        }
                    }
                    () = &mut shutdown => break,
                }
            }
        })
    }
}

/// HTTP server for daemon mode.
pub struct HttpServer {
    app: Router,
}

impl HttpServer {
    pub fn new(app: Router) -> Self {
        Self { app }
    }

    /// Serve on `listener` until `shutdown` resolves, then wait for in-flight
    /// requests. New connections stop being accepted as soon as it resolves.
    pub fn run<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> impl Future<Output = std::io::Result<()>> + Send
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .into_future()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_wraps_everything_that_can_respond() {
        assert_eq!(position(Stage::RequestId), 0);
        assert!(position(Stage::AccessLog) < position(Stage::ErrorNormalizer));
    }

    #[test]
    fn headers_and_cors_precede_body_handling() {
        assert!(position(Stage::SecurityHeaders) < position(Stage::BodyLimit));
        assert!(position(Stage::Cors) < position(Stage::BodyLimit));
    }

    #[test]
    fn body_limit_precedes_rate_limit() {
        assert!(position(Stage::BodyLimit) < position(Stage::RateLimit));
    }

    #[test]
    fn errors_from_every_inner_stage_are_normalized() {
        let normalizer = position(Stage::ErrorNormalizer);
        for stage in [
            Stage::BodyLimit,
            Stage::RateLimit,
            Stage::DependencyGate,
            Stage::PanicGuard,
        ] {
            assert!(normalizer < position(stage), "{stage:?} is outside the normalizer");
        }
    }

    #[test]
    fn every_stage_appears_once() {
        for stage in PIPELINE {
            assert_eq!(PIPELINE.iter().filter(|s| **s == stage).count(), 1);
        }
    }
}
