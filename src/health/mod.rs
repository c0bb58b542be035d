//! Liveness probe.
//!
//! `GET /health` answers as long as the process can run a handler. It does
//! not touch the persistence backend.

use std::time::Instant;

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Route of the liveness probe.
pub const LIVENESS_PATH: &str = "/health";

/// Body of the liveness response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
    /// RFC 3339 / ISO-8601 wall-clock time.
    pub timestamp: String,
    /// Seconds since the gateway started.
    pub uptime: f64,
}

impl Liveness {
    pub fn now(started_at: Instant) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: started_at.elapsed().as_secs_f64(),
        }
    }
}

pub async fn liveness(State(started_at): State<Instant>) -> Json<Liveness> {
    Json(Liveness::now(started_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reports_ok_with_parseable_timestamp() {
        let started = Instant::now() - Duration::from_secs(3);
        let live = Liveness::now(started);

        assert_eq!(live.status, "ok");
        assert!(chrono::DateTime::parse_from_rfc3339(&live.timestamp).is_ok());
        assert!(live.uptime >= 3.0);
    }
}
