//! User account endpoints.

use super::{envelope, AppState};
use crate::auth::Registration;
use crate::error::{AuthError, StoreError};
use crate::store::{Account, AccountChanges, RecordStore};
use crate::validation::{self, check, str_field, text_field};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

/// Wire view of an account: digest stripped, camelCase keys.
fn account_view(account: &Account) -> Value {
    json!({
        "id": account.id,
        "username": account.username,
        "clientId": account.client_id,
        "roleId": account.role_id,
        "phone": account.phone,
        "email": account.email,
        "createTime": account.create_time,
    })
}

/// POST /api/users/login — authenticate and mint a session token pair.
pub async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return envelope::error(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"))
        }
    };

    let failures = check(validation::USER_LOGIN, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let username = str_field(&body, "username").unwrap_or_default();
    let password = str_field(&body, "password").unwrap_or_default();
    tracing::info!("login attempt, {username}");

    match state.auth.login(username, password) {
        Ok(session) => {
            tracing::info!("login successful, {}", session.username);
            envelope::data(json!({
                "username": session.username,
                "accessToken": session.access_token,
                "refreshToken": session.refresh_token,
            }))
        }
        Err(e) if e.is_client_fault() => {
            tracing::warn!("login failed for {username}: {e}");
            envelope::error(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => {
            tracing::error!("login failed for {username}: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "login failed, system error")
        }
    }
}

/// POST /api/users/add — create an account and return its first access token.
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

    let failures = check(validation::USER_ADD, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let username = str_field(&body, "username").unwrap_or_default();
    let password = str_field(&body, "password").unwrap_or_default();
    let client_id = str_field(&body, "clientId").unwrap_or_default();
    let role_id = text_field(&body, "roleId");

    let registration = Registration {
        username,
        password,
        client_id,
        role_id: role_id.as_deref(),
        phone: str_field(&body, "phone"),
        email: str_field(&body, "email"),
    };

    match state.auth.register(registration) {
        Ok(registered) => {
            tracing::info!("add user successful, {}", registered.account.username);
            envelope::data(json!({
                "username": registered.account.username,
                "accessToken": registered.access_token,
            }))
        }
        Err(AuthError::Store(StoreError::Duplicate(_))) => {
            tracing::warn!("the username already exists, {username}");
            envelope::error(StatusCode::BAD_REQUEST, "user already exists")
        }
        Err(e) => {
            tracing::error!("add user failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "add user failed, system error")
        }
    }
}

/// POST /api/users/update — partial update by id. A supplied password is
/// re-digested; the response is the updated row with the digest stripped.
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

    let failures = check(validation::USER_UPDATE, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let id = text_field(&body, "id").unwrap_or_default();
    let digest = str_field(&body, "password").map(|pw| state.auth.digest_password(pw));
    let client_id = text_field(&body, "clientId");

    let changes = AccountChanges {
        username: str_field(&body, "username"),
        digest: digest.as_deref(),
        client_id: client_id.as_deref(),
        phone: str_field(&body, "phone"),
        email: str_field(&body, "email"),
    };

    match state.store.update_account(&id, changes) {
        Ok(Some(account)) => {
            tracing::info!("update user successful, {}", account.username);
            envelope::data(account_view(&account))
        }
        Ok(None) => envelope::error(StatusCode::NOT_FOUND, "user does not exist"),
        Err(StoreError::Duplicate(_)) => {
            envelope::error(StatusCode::BAD_REQUEST, "user already exists")
        }
        Err(e) => {
            tracing::error!("update user failed: {e}");
            envelope::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "update user failed, system error",
            )
        }
    }
}

/// POST /api/users/delete — delete by account id. Idempotent: a missing
/// account still reports success.
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

    let failures = check(validation::USER_DELETE, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let user_id = text_field(&body, "userId").unwrap_or_default();
    match state.store.delete_account_by_id(&user_id) {
        Ok(removed) => {
            tracing::info!("delete user successful, {user_id} (removed: {removed})");
            envelope::ok()
        }
        Err(e) => {
            tracing::error!("delete user failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "用户删除异常, 请重新尝试!")
        }
    }
}

fn remove_first_by_client(store: &dyn RecordStore, client_id: &str) -> Result<bool, StoreError> {
    match store.find_account_by_client(client_id)? {
        Some(account) => {
            store.delete_account_by_id(&account.id)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// POST /api/users/deleteById — delete the first account carrying the
/// given client id; 404 when no account does.
pub async fn handle_delete_by_client(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => {
            return envelope::error(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"))
        }
    };

    let failures = check(validation::USER_DELETE_BY_CLIENT, &body);
    if !failures.is_empty() {
        return envelope::errors(StatusCode::BAD_REQUEST, &failures);
    }

    let client_id = text_field(&body, "clientId").unwrap_or_default();
    match remove_first_by_client(state.store.as_ref(), &client_id) {
        Ok(true) => {
            tracing::info!("delete user successful, {client_id}");
            envelope::message(&format!("{client_id} successfully deleted"))
        }
        Ok(false) => {
            envelope::error(StatusCode::NOT_FOUND, &format!("{client_id} does not exist"))
        }
        Err(e) => {
            tracing::error!("delete user by client failed: {e}");
            envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "System error!")
        }
    }
}

/// GET /api/users/list — every account except the admin, digests stripped.
pub async fn handle_list(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.list_accounts_except(state.auth.admin_username()) {
        Ok(accounts) => {
            tracing::info!("get user list successful, {} accounts", accounts.len());
            let views: Vec<Value> = accounts.iter().map(account_view).collect();
            envelope::data(Value::Array(views))
        }
        Err(e) => {
            tracing::error!("get user list failed: {e}");
            envelope::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Get user list exception, please try again!",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::config::AuthConfig;
    use crate::store::SqliteStore;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory());
        let config = AuthConfig {
            secret: "test-secret".to_string(),
            digest_iterations: 1000,
            digest_pepper: "pepper".to_string(),
            ..AuthConfig::default()
        };
        let auth = Arc::new(Authenticator::new(store.clone(), &config));
        AppState { auth, store }
    }

    async fn add_alice(state: &AppState) {
        let (status, _) = handle_add(
            State(state.clone()),
            Ok(Json(json!({
                "username": "alice",
                "password": "Secret1@",
                "clientId": "1001"
            }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn login_returns_session_envelope() {
        let state = test_state();
        add_alice(&state).await;

        let (status, Json(body)) = handle_login(
            State(state),
            Ok(Json(json!({"username": "alice", "password": "Secret1@"}))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["username"], "alice");
        assert!(!body["data"]["accessToken"].as_str().unwrap().is_empty());
        assert!(!body["data"]["refreshToken"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_bad_credentials_is_400() {
        let state = test_state();
        add_alice(&state).await;

        let (status, Json(body)) = handle_login(
            State(state),
            Ok(Json(json!({"username": "alice", "password": "nope"}))),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["errors"][0]["msg"],
            "login failed, username or password is wrong。"
        );
        assert_eq!(body["errors"][0]["code"], "400");
    }

    #[tokio::test]
    async fn login_validation_failures_are_reported() {
        let state = test_state();

        let (status, Json(body)) =
            handle_login(State(state), Ok(Json(json!({"username": "alice"})))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["msg"], "password is required");
    }

    #[tokio::test]
    async fn add_returns_username_and_token() {
        let state = test_state();

        let (status, Json(body)) = handle_add(
            State(state.clone()),
            Ok(Json(json!({
                "username": "alice",
                "password": "Secret1@",
                "clientId": "1001",
                "phone": "555-0100"
            }))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "alice");
        assert!(!body["data"]["accessToken"].as_str().unwrap().is_empty());

        // Stored digested, not raw.
        let account = state
            .store
            .find_account_by_username("alice")
            .unwrap()
            .unwrap();
        assert_ne!(account.digest, "Secret1@");
        assert_eq!(account.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn add_duplicate_username_is_400() {
        let state = test_state();
        add_alice(&state).await;

        let (status, Json(body)) = handle_add(
            State(state),
            Ok(Json(json!({
                "username": "alice",
                "password": "Other2@",
                "clientId": "1002"
            }))),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["msg"], "user already exists");
    }

    #[tokio::test]
    async fn update_redigests_password_and_strips_it() {
        let state = test_state();
        add_alice(&state).await;
        let id = state
            .store
            .find_account_by_username("alice")
            .unwrap()
            .unwrap()
            .id;

        let (status, Json(body)) = handle_update(
            State(state.clone()),
            Ok(Json(json!({
                "id": id,
                "username": "alice",
                "password": "Rotated2@",
                "phone": "555-0199"
            }))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phone"], "555-0199");
        assert!(body["data"].get("password").is_none());
        assert!(body["data"].get("digest").is_none());

        let account = state.store.find_account_by_id(&id).unwrap().unwrap();
        assert_eq!(account.digest, state.auth.digest_password("Rotated2@"));

        let (login_status, _) = handle_login(
            State(state),
            Ok(Json(json!({"username": "alice", "password": "Rotated2@"}))),
        )
        .await;
        assert_eq!(login_status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_unknown_id_is_404() {
        let state = test_state();

        let (status, Json(body)) = handle_update(
            State(state),
            Ok(Json(json!({"id": "no-such-id", "username": "ghost"}))),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["msg"], "user does not exist");
        assert_eq!(body["errors"][0]["code"], "404");
    }

    #[tokio::test]
    async fn delete_reports_success_even_when_missing() {
        let state = test_state();
        add_alice(&state).await;
        let id = state
            .store
            .find_account_by_username("alice")
            .unwrap()
            .unwrap()
            .id;

        let (status, Json(body)) = handle_delete(
            State(state.clone()),
            Ok(Json(json!({"userId": id.clone()}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        // Second delete of the same id still reports success.
        let (status, _) =
            handle_delete(State(state), Ok(Json(json!({"userId": id})))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_by_client_reports_found_and_missing() {
        let state = test_state();
        let (status, _) = handle_add(
            State(state.clone()),
            Ok(Json(json!({
                "username": "carol",
                "password": "Secret1@",
                "clientId": "7777"
            }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, Json(body)) = handle_delete_by_client(
            State(state.clone()),
            Ok(Json(json!({"clientId": "7777"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "7777 successfully deleted");

        let (status, Json(body)) =
            handle_delete_by_client(State(state), Ok(Json(json!({"clientId": "7777"})))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["msg"], "7777 does not exist");
    }

    #[tokio::test]
    async fn list_excludes_admin_and_digests() {
        let state = test_state();
        state.auth.bootstrap().unwrap();
        add_alice(&state).await;

        let (status, Json(body)) = handle_list(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        let listed = body["data"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["username"], "alice");
        assert_eq!(listed[0]["clientId"], "1001");
        assert!(listed[0].get("digest").is_none());
        assert!(listed[0].get("password").is_none());
    }
}
