//! Device registry endpoints.

use super::{envelope, AppState};
use crate::error::StoreError;
use crate::store::{Device, DeviceChanges, NewDevice};
use crate::validation::{self, check, str_field, text_field};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Wire view of a device. The audit fields keep their snake_case wire
/// names; timestamps are camelCase like the account views.
fn device_view(device: &Device) -> Value {
    json!({
        "id": device.id,
        "deviceName": device.device_name,
        "model": device.model,
        "type": device.device_type,
        "platform": device.platform,
        "create_user": device.create_user,
        "update_user": device.update_user,
        "createTime": device.create_time,
        "updateTime": device.update_time,
    })
}

/// POST /api/devices/add — register a device under a unique name.
pub async fn handle_add(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return envelope::error(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"))
        }
    };

    let failures = check(validation::DEVICE_ADD, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let device_name = str_field(&body, "deviceName").unwrap_or_default();
    let model = str_field(&body, "model").unwrap_or_default();
    let create_user = text_field(&body, "create_user").unwrap_or_default();

    let new_device = NewDevice {
        device_name,
        model,
        device_type: str_field(&body, "type"),
        platform: str_field(&body, "platform"),
        create_user: &create_user,
    };

    match state.store.create_device(new_device) {
        Ok(device) => {
            tracing::info!("add device successful, {}", device.device_name);
            envelope::data(device_view(&device))
        }
        Err(StoreError::Duplicate(_)) => {
            tracing::warn!("the device already exists, {device_name}");
            envelope::error(StatusCode::BAD_REQUEST, "device already exists")
        }
        Err(e) => {
            tracing::error!("add device failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "System error!")
        }
    }
}

/// POST /api/devices/update — update by device name, stamping the
/// updating user and time.
pub async fn handle_update(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return envelope::error(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"))
        }
    };

    let failures = check(validation::DEVICE_UPDATE, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let device_name = text_field(&body, "deviceName").unwrap_or_default();
    let model = text_field(&body, "model");
    let update_user = text_field(&body, "update_user");

    let changes = DeviceChanges {
        model: model.as_deref(),
        device_type: str_field(&body, "type"),
        platform: str_field(&body, "platform"),
        update_user: update_user.as_deref(),
    };

    match state.store.update_device_by_name(&device_name, changes) {
        Ok(Some(device)) => {
            tracing::info!("update device successful, {}", device.device_name);
            envelope::data(device_view(&device))
        }
        Ok(None) => envelope::error(StatusCode::NOT_FOUND, "device does not exist"),
        Err(e) => {
            tracing::error!("update device failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "System error!")
        }
    }
}

/// POST /api/devices/delete — delete by device id. Idempotent: a missing
/// device still reports success.
pub async fn handle_delete(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return envelope::error(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"))
        }
    };

    let failures = check(validation::DEVICE_DELETE, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let id = text_field(&body, "id").unwrap_or_default();
    match state.store.delete_device_by_id(&id) {
        Ok(removed) => {
            tracing::info!("delete device successful, {id} (removed: {removed})");
            envelope::ok()
        }
        Err(e) => {
            tracing::error!("delete device failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "System error!")
        }
    }
}

/// GET /api/devices/get — look up one device by id query parameter.
pub async fn handle_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let query = serde_json::to_value(&params).unwrap_or_default();
    let failures = check(validation::DEVICE_GET, &query);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let id = params.get("id").map(String::as_str).unwrap_or_default();
    match state.store.find_device_by_id(id) {
        Ok(Some(device)) => envelope::data(device_view(&device)),
        Ok(None) => envelope::error(StatusCode::NOT_FOUND, "device does not exist"),
        Err(e) => {
            tracing::error!("get device failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "System error!")
        }
    }
}
