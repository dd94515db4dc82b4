//! The JSON envelope every endpoint speaks.
//!
//! Success: `{"success": true, "data": ...}`, with `"message"` instead of
//! `"data"` where an endpoint only reports text. Failure:
//! `{"success": false, "errors": [{"msg": ..., "code": ...}]}`, one entry
//! per problem, the HTTP status stamped on each as its `code`.

use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

/// `200 {"success": true, "data": ...}`
pub fn data(value: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": value })))
}

/// `200 {"success": true}`
pub fn ok() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true })))
}

/// `200 {"success": true, "message": ...}`
pub fn message(text: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": text })),
    )
}

/// Failure with one message per entry.
pub fn errors(status: StatusCode, messages: &[&str]) -> (StatusCode, Json<Value>) {
    let code = status.as_u16().to_string();
    let entries: Vec<Value> = messages
        .iter()
        .map(|msg| json!({ "msg": msg, "code": code }))
        .collect();
    (status, Json(json!({ "success": false, "errors": entries })))
}

/// Single-message failure.
pub fn error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    errors(status, &[message])
}
