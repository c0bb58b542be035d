//! Fixed-window rate limiting for the API prefix.
//!
//! Each client gets a counter that resets at discrete window boundaries.
//! Windows do not slide, so a client can issue up to twice the ceiling
//! across a boundary; that is the accepted behavior.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::request::ClientIdentity;
use crate::observability::metrics;
use crate::routing::matcher::PathPrefixMatcher;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining: u32 },
    Reject { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client fixed-window counters.
///
/// The map is sharded, so checks for different clients never contend and a
/// check for one client is atomic with respect to that client's entry.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests)
    }

    /// Count one request from `client` at `now`.
    pub fn check(&self, client: &str, now: Instant) -> Decision {
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert(Window { started: now, count: 0 });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.max_requests {
            let resets_at = entry.started + self.window;
            return Decision::Reject {
                retry_after: resets_at.saturating_duration_since(now),
            };
        }

        entry.count += 1;
        Decision::Allow {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop windows that have expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - self.windows.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// State for the rate limit stage.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub scope: PathPrefixMatcher,
    pub trust_forwarded_for: bool,
    pub message: Arc<str>,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, config: &RateLimitConfig, message: &str) -> Self {
        Self {
            limiter,
            scope: PathPrefixMatcher::new(config.path_prefix.clone()),
            trust_forwarded_for: config.trust_forwarded_for,
            message: Arc::from(message),
        }
    }
}

/// Middleware applying the limiter to requests under the configured prefix.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.scope.matches(&request) {
        return next.run(request).await;
    }

    let client = ClientIdentity::resolve(&request, state.trust_forwarded_for);
    match state.limiter.check(client.as_str(), Instant::now()) {
        Decision::Allow { .. } => next.run(request).await,
        Decision::Reject { retry_after } => {
            tracing::debug!(client = %client, retry_after = ?retry_after, "Rate limit exceeded");
            metrics::record_rate_limited();
            rejection(&state.message, retry_after)
        }
    }
}

fn rejection(message: &str, retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_ceiling_then_rejects() {
        let limiter = RateLimiter::new(WINDOW, 5);
        let start = Instant::now();

        for i in 0..5u32 {
            let at = start + Duration::from_secs(u64::from(i) * 2);
            assert_eq!(
                limiter.check("10.0.0.1", at),
                Decision::Allow { remaining: 4 - i }
            );
        }

        let sixth = limiter.check("10.0.0.1", start + Duration::from_secs(10));
        assert_eq!(
            sixth,
            Decision::Reject {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[test]
    fn window_expiry_resets_counter() {
        let limiter = RateLimiter::new(WINDOW, 5);
        let start = Instant::now();

        for _ in 0..6 {
            limiter.check("10.0.0.1", start);
        }
        assert!(!limiter.check("10.0.0.1", start + Duration::from_secs(59)).is_allowed());
        assert_eq!(
            limiter.check("10.0.0.1", start + Duration::from_secs(61)),
            Decision::Allow { remaining: 4 }
        );
    }

    #[test]
    fn rejection_does_not_extend_window() {
        let limiter = RateLimiter::new(WINDOW, 1);
        let start = Instant::now();

        assert!(limiter.check("c", start).is_allowed());
        for s in 1..60 {
            assert!(!limiter.check("c", start + Duration::from_secs(s)).is_allowed());
        }
        // Exactly at the boundary the old window has expired.
        assert!(limiter.check("c", start + WINDOW).is_allowed());
    }

    #[test]
    fn boundary_burst_is_permitted() {
        let limiter = RateLimiter::new(WINDOW, 3);
        let start = Instant::now();

        let end_of_first = start + Duration::from_secs(59);
        let start_of_second = start + Duration::from_secs(60);
        limiter.check("c", start);
        let allowed = (0..3)
            .filter(|_| limiter.check("c", end_of_first).is_allowed())
            .count()
            + (0..3)
                .filter(|_| limiter.check("c", start_of_second).is_allowed())
                .count();
        // One early request, two late in window one, three in window two.
        assert_eq!(allowed, 5);
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(WINDOW, 1);
        let now = Instant::now();
        assert!(limiter.check("a", now).is_allowed());
        assert!(!limiter.check("a", now).is_allowed());
        assert!(limiter.check("b", now).is_allowed());
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let limiter = RateLimiter::new(WINDOW, 10);
        let start = Instant::now();
        limiter.check("old", start);
        limiter.check("fresh", start + Duration::from_secs(30));

        assert_eq!(limiter.purge_expired(start + Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn rejection_carries_retry_after() {
        let response = rejection("slow down", Duration::from_millis(1500));
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
