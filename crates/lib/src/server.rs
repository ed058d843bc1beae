//! HTTP surface: POST /send and GET /health, backed by the session manager.

use crate::config::ServerConfig;
use crate::session::SessionManager;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state for the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
}

/// POST /send body. Fields are optional so missing ones map to 400, not a
/// deserialization rejection.
#[derive(Debug, Deserialize)]
struct SendRequest {
    to: Option<String>,
    text: Option<String>,
}

/// Build the router (exposed separately so tests can drive it on any listener).
pub fn build_router(session: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/send", post(send_http))
        .route("/health", get(health_http))
        .with_state(AppState { session })
}

/// Run the HTTP server; binds to config.bind:config.port. Blocks until shutdown.
pub async fn run_server(config: &ServerConfig, session: Arc<SessionManager>) -> Result<()> {
    let app = build_router(session);
    let bind_addr = format!("{}:{}", config.bind.trim(), config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("http surface listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server exited")?;
    log::info!("http surface stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// POST /send — send a text message on demand. 400 on missing fields, 500 when
/// the downstream send fails (e.g. no open session).
async fn send_http(
    State(state): State<AppState>,
    Json(body): Json<SendRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(to) = body.to.filter(|s| !s.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing field: to" })),
        );
    };
    let Some(text) = body.text.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing field: text" })),
        );
    };
    match state.session.send_text(&to, &text).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "sent" }))),
        Err(e) => {
            log::warn!("send endpoint: delivery to {} failed: {}", to, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e })))
        }
    }
}

/// GET /health — liveness probe; `connected` reflects whether a session is open.
async fn health_http(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "connected": state.session.connected().await,
    }))
}
