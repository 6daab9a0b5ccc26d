// HTTP API for running catalog commands
//
// Routes:
// - POST /api/execute   run a command (X-API-Key required)
// - GET  /api/commands  list the catalog
// - POST /api/commands/reload  re-read the catalog file (X-API-Key required)
// - GET  /health        liveness
// - GET  /metrics       Prometheus text format

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::metrics;
use crate::runner::{CommandRunner, RunError};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Principal recorded for requests made through the API
pub const API_PRINCIPAL: &str = "API";

/// Message returned for unknown command names
pub const NOT_FOUND_MESSAGE: &str = "命令未找到";

#[derive(Clone)]
pub struct AppState {
    runner: Arc<CommandRunner>,
    api_key: Arc<str>,
}

impl AppState {
    pub fn new(runner: Arc<CommandRunner>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            runner,
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBody {
    command_name: String,

    #[serde(default)]
    params: HashMap<String, Value>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/execute", post(execute_handler))
        .route("/api/commands", get(list_handler))
        .route("/api/commands/reload", post(reload_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C
pub async fn start_server(config: &ServerConfig, runner: Arc<CommandRunner>) -> Result<()> {
    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .context("An API key is required to serve (set server.api_key or SMARTCODE_API_KEY)")?;

    metrics::init();
    let app = router(AppState::new(runner, api_key));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", addr))?;

    info!("🚀 Serving command API on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == expected)
}

/// Parameter values arrive as JSON; numbers and booleans are used verbatim
fn param_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn execute_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ExecuteBody>, JsonRejection>,
) -> Response {
    if !authorized(&headers, &state.api_key) {
        warn!("Rejected execute request with invalid API key");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let values: HashMap<String, String> = body
        .params
        .into_iter()
        .map(|(name, value)| (name, param_text(value)))
        .collect();

    match state
        .runner
        .execute(&body.command_name, &values, API_PRINCIPAL)
        .await
    {
        Ok(result) if result.exit_succeeded => (
            StatusCode::OK,
            Json(json!({ "output": result.stdout, "error": result.stderr })),
        )
            .into_response(),
        Ok(result) => {
            let message = result
                .error_message
                .clone()
                .unwrap_or_else(|| result.stderr.clone());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        Err(RunError::NotFound(_)) => error_response(StatusCode::BAD_REQUEST, NOT_FOUND_MESSAGE),
        Err(e @ RunError::SubstitutionIncomplete { .. }) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ RunError::Interrupted(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.catalog().list().await)
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.api_key) {
        warn!("Rejected reload request with invalid API key");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    match state.runner.catalog().reload().await {
        Ok(count) => (StatusCode::OK, Json(json!({ "commands": count }))).into_response(),
        Err(e) => {
            error!("Failed to reload catalog: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
