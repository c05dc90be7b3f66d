use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{ChangeNotification, WebhookAuthParams};
use crate::pipeline::{self, Outcome};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Lead change-notification webhook.
///
/// Receives `{ type, table?, record, old_record? }` notifications from the
/// source-of-record database trigger and runs the conversion pipeline.
/// Business non-matches always answer 200 so the upstream producer does
/// not retry them; only auth, dispatch and internal faults use error
/// statuses.
///
/// Authentication: `secret` query parameter compared against
/// `WEBHOOK_SECRET` (when configured).
pub async fn lead_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookAuthParams>,
    Json(notification): Json<ChangeNotification>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    validate_webhook_secret(&state, params.secret.as_deref())?;

    tracing::info!(
        "Received {:?} notification for table {:?}",
        notification.change_type,
        notification.table
    );

    let outcome = pipeline::process_notification(&state, notification).await?;

    Ok((StatusCode::OK, Json(outcome_body(outcome))))
}

/// Response body for each pipeline outcome. Ignores and skips both carry
/// the `skipped` marker the dashboard filters on.
fn outcome_body(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Ignored { reason } => json!({ "message": reason, "skipped": true }),
        Outcome::Skipped { reason } => json!({ "message": reason, "skipped": true }),
        Outcome::Dispatched {
            event_id,
            used_id,
            events_received,
        } => json!({
            "success": true,
            "event_id": event_id,
            "used_id": used_id,
            "events_received": events_received,
        }),
    }
}

/// Validate the shared secret from the `secret` query parameter.
fn validate_webhook_secret(state: &AppState, secret: Option<&str>) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warned at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    let secret = secret
        .ok_or_else(|| AppError::Unauthorized("Missing secret query parameter".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(secret, expected_secret) {
        tracing::warn!("Invalid webhook secret received");
        return Err(AppError::Unauthorized("Invalid webhook secret".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
