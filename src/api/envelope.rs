use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// Correlation block attached to every response, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub request_id: Uuid,
    pub timestamp: String,
}

impl Meta {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// `{ data, meta }` success envelope. Every success is a 200; the envelope
/// shape, not the status line, is the API contract.
pub fn success(request_id: Uuid, data: Value) -> Response {
    let body = json!({
        "data": data,
        "meta": Meta::new(request_id),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// `{ error, meta }` failure envelope with the error's fixed status code.
pub fn failure(request_id: Uuid, error: &ApiError) -> Response {
    let body = json!({
        "error": error.to_body(),
        "meta": Meta::new(request_id),
    });
    (error.status_code(), Json(body)).into_response()
}

/// Collapse a handler outcome into the wire envelope.
pub fn respond(request_id: Uuid, result: Result<Value, ApiError>) -> Response {
    match result {
        Ok(data) => success(request_id, data),
        Err(error) => failure(request_id, &error),
    }
}
