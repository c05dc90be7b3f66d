//! Durable state: the append-only dispatch log (dedup index) and the
//! diagnostic write-back onto the source lead rows.

use crate::errors::AppError;
use crate::models::{DiagnosticRow, DispatchRecord};
use sqlx::PgPool;

/// Maximum length of a diagnostic message written back to a lead row.
const MAX_DIAGNOSTIC_LEN: usize = 300;

pub struct RelayStorage {
    pool: PgPool,
}

impl RelayStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checks whether an event id was already dispatched.
    ///
    /// Early-exit only; `record_dispatch` remains the authoritative atomic
    /// gate for concurrent deliveries.
    pub async fn event_exists(&self, event_id: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM dispatched_events
                WHERE event_id = $1
            )
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Appends one dispatch record. The conditional insert on the primary
    /// key makes this the at-most-once gate: exactly one of any set of
    /// concurrent submitters for the same event id sees `true`.
    pub async fn record_dispatch(&self, record: &DispatchRecord) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO dispatched_events
                (event_id, lead_ref, status, event_name, value, sent_at, conversion_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.lead_ref)
        .bind(&record.status)
        .bind(&record.event_name)
        .bind(record.value)
        .bind(record.sent_at)
        .bind(record.conversion_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Writes a skip/info annotation onto the lead row so operators can see
    /// in the dashboard why an event was not sent.
    ///
    /// Best-effort: a failure to log a skip reason is swallowed and only
    /// observability-logged, never propagated.
    pub async fn log_skip_reason(&self, lead_id: &str, reason: &str) {
        if lead_id.is_empty() {
            return;
        }
        // Prefix distinguishes informational entries from dispatch errors
        let note = truncate_diagnostic(&format!("LOG: {}", reason));
        if let Err(e) = self.write_diagnostic(lead_id, Some(&note)).await {
            tracing::error!("Failed to log skip reason for lead {}: {}", lead_id, e);
        }
    }

    /// Records an outbound dispatch failure on the lead row. Best-effort.
    pub async fn write_dispatch_failure(&self, lead_id: &str, detail: &str) {
        if lead_id.is_empty() {
            return;
        }
        let note = truncate_diagnostic(&format!("Dispatch error: {}", detail));
        if let Err(e) = self.write_diagnostic(lead_id, Some(&note)).await {
            tracing::error!(
                "Failed to record dispatch failure for lead {}: {}",
                lead_id,
                e
            );
        }
    }

    /// Replaces the diagnostic column with a post-success data-quality
    /// summary. Best-effort.
    pub async fn write_quality_summary(&self, lead_id: &str, summary: &str) {
        if lead_id.is_empty() {
            return;
        }
        let note = truncate_diagnostic(summary);
        if let Err(e) = self.write_diagnostic(lead_id, Some(&note)).await {
            tracing::error!(
                "Failed to write quality summary for lead {}: {}",
                lead_id,
                e
            );
        }
    }

    /// Per-row conditional update keyed by lead id. The diagnostic column
    /// is the only lead field this service ever writes.
    async fn write_diagnostic(
        &self,
        lead_id: &str,
        diagnostic: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET diagnostic = $2, updated_at = now()
            WHERE lead_id = $1
            "#,
        )
        .bind(lead_id)
        .bind(diagnostic)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("No lead row found for diagnostic write: {}", lead_id);
        }
        Ok(())
    }

    /// Most recent successfully dispatched events, newest first.
    pub async fn recent_dispatches(&self, limit: i64) -> Result<Vec<DispatchRecord>, AppError> {
        let rows = sqlx::query_as::<_, DispatchRecord>(
            r#"
            SELECT event_id, lead_ref, status, event_name, value, sent_at, conversion_time
            FROM dispatched_events
            ORDER BY sent_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Most recent leads flagged with a non-empty diagnostic, newest first.
    pub async fn recent_diagnostics(&self, limit: i64) -> Result<Vec<DiagnosticRow>, AppError> {
        let rows = sqlx::query_as::<_, DiagnosticRow>(
            r#"
            SELECT lead_id, full_name, email, status, diagnostic, updated_at
            FROM leads
            WHERE diagnostic IS NOT NULL AND diagnostic <> ''
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Truncates a diagnostic message on a char boundary so external error
/// bodies of arbitrary size fit the column.
fn truncate_diagnostic(message: &str) -> String {
    if message.chars().count() <= MAX_DIAGNOSTIC_LEN {
        return message.to_string();
    }
    let truncated: String = message.chars().take(MAX_DIAGNOSTIC_LEN - 3).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_message_unchanged() {
        assert_eq!(truncate_diagnostic("short"), "short");
    }

    #[test]
    fn test_truncate_long_message() {
        let long = "x".repeat(1000);
        let truncated = truncate_diagnostic(&long);
        assert_eq!(truncated.chars().count(), MAX_DIAGNOSTIC_LEN);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(500);
        let truncated = truncate_diagnostic(&long);
        assert_eq!(truncated.chars().count(), MAX_DIAGNOSTIC_LEN);
    }
}
