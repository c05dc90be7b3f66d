use crate::config::Config;
use crate::meta_client::MetaClient;
use crate::models::{LogsData, LogsResponse};
use crate::storage::RelayStorage;
use axum::{extract::State, http::StatusCode, Json};
use moka::future::Cache;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// How many rows each log list of the dashboard surface returns.
const LOG_LIMIT: i64 = 20;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (dedup index + diagnostic write-back).
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Client for the Meta Conversions API.
    pub meta_client: MetaClient,
    /// In-flight dispatch guard keyed by event id. Suppresses concurrent
    /// duplicate dispatches within this process; the durable dedup index
    /// remains authoritative across restarts.
    pub inflight: Cache<String, i64>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-relay",
            "version": "0.1.0"
        })),
    )
}

/// GET /api/v1/events/logs
///
/// Read surface for the (external) monitoring dashboard: the most recent
/// successful dispatches plus the most recent leads carrying a non-empty
/// diagnostic annotation, each newest first.
pub async fn event_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LogsResponse>, crate::errors::AppError> {
    let storage = RelayStorage::new(state.db.clone());

    let success_logs = storage.recent_dispatches(LOG_LIMIT).await?;
    let error_logs = storage.recent_diagnostics(LOG_LIMIT).await?;

    tracing::debug!(
        "Log query: {} dispatches, {} diagnostics",
        success_logs.len(),
        error_logs.len()
    );

    Ok(Json(LogsResponse {
        success: true,
        data: LogsData {
            success_logs,
            error_logs,
        },
    }))
}
