//! Axum-based HTTP gateway for the account and device endpoints.
//!
//! axum/hyper give us:
//! - Proper HTTP/1.1 parsing and compliance
//! - Request body size limits (64KB max)
//! - Request timeouts (30s) to prevent slow-loris abuse
//!
//! Routes and response shapes are relied on by deployed clients, so they
//! stay put; see [`envelope`] for the shared JSON envelope.

pub mod devices;
pub mod envelope;
pub mod users;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::store::{RecordStore, SqliteStore};
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout for any single request.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared per-request state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub store: Arc<dyn RecordStore>,
}

/// Open the store, run the configured bootstrap, and serve the gateway
/// until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open(&config.database.path)?);
    tracing::info!("record store open at {}", config.database.path.display());

    let auth = Arc::new(Authenticator::new(store.clone(), &config.auth));
    auth.bootstrap()?;

    let state = AppState { auth, store };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("gateway listening on {addr}");

    // ── CORS — allow browser clients from any origin ──
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // Build router with middleware
    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/users/login", post(users::handle_login))
        .route("/api/users/add", post(users::handle_add))
        .route("/api/users/update", post(users::handle_update))
        .route("/api/users/delete", post(users::handle_delete))
        .route("/api/users/deleteById", post(users::handle_delete_by_client))
        .route("/api/users/list", get(users::handle_list))
        .route("/api/devices/add", post(devices::handle_add))
        .route("/api/devices/update", post(devices::handle_update))
        .route("/api/devices/delete", post(devices::handle_delete))
        .route("/api/devices/get", get(devices::handle_get))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)));

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health — liveness plus store reachability.
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_ok = state.store.health_check();
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if store_ok { "ok" } else { "degraded" },
            "store": store_ok,
        })),
    )
}
