//! Default application routes mounted by the `edge-gateway` binary.
//!
//! Real deployments embed the library and hand their own `Router` to the
//! orchestrator or hosted gateway; these exist so the binary answers
//! something under the API prefix out of the box.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};

use crate::error::GatewayError;
use crate::http::request::ParsedBody;

pub fn api() -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/echo", post(echo))
}

async fn ping() -> Json<Value> {
    Json(json!({ "success": true, "data": "pong" }))
}

async fn echo(body: ParsedBody) -> Result<Json<Value>, GatewayError> {
    let data = match body {
        ParsedBody::Json(value) => value,
        ParsedBody::Form(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect::<Map<_, _>>(),
        ),
        ParsedBody::Unparsed => {
            return Err(GatewayError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Expected a JSON or URL-encoded body",
            ))
        }
    };
    Ok(Json(json!({ "success": true, "data": data })))
}
