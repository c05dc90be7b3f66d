use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change reported by the upstream database notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
}

/// One change notification from the source-of-record database trigger.
///
/// Shape: `{ type, table?, record, old_record? }`. Transient; constructed
/// per request and never persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeNotification {
    #[serde(rename = "type")]
    pub change_type: ChangeType,

    /// Source table name; informational only.
    #[serde(default)]
    pub table: Option<String>,

    /// Snapshot of the lead after the change. Missing lead data is a
    /// business "ignored", not an error.
    #[serde(default)]
    pub record: Option<LeadRecord>,

    /// Snapshot before the change; only present for updates.
    #[serde(default)]
    pub old_record: Option<LeadRecord>,
}

/// Snapshot of a lead row at a point in time.
///
/// Owned by the external source of record. This service reads every field
/// and writes back only `diagnostic`. Unknown columns are tolerated and
/// preserved in `extra`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadRecord {
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,

    // Contact / identity fields
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,

    // Location
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,

    // Technical fields (sent raw; not PII-hashed)
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,

    // Attribution fields
    #[serde(default)]
    pub fbp: Option<String>,
    #[serde(default)]
    pub fbc: Option<String>,
    #[serde(default)]
    pub fbclid: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,

    // Timestamps (ISO-8601 strings as delivered by the notifier)
    #[serde(default)]
    pub conversion_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    /// Tri-state returning-customer flag; upstream stores either a boolean
    /// or the strings "TRUE"/"FALSE".
    #[serde(default)]
    pub is_customer: Option<CustomerFlag>,

    /// Free-text diagnostic column this service writes back to. Doubles as
    /// an error channel and a success/quality channel for the dashboard.
    #[serde(default)]
    pub diagnostic: Option<String>,

    /// Any additional columns the trigger happens to send.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl LeadRecord {
    /// Resolves the effective identity for this lead: first non-blank of
    /// lead id, phone, email, in that fixed priority.
    ///
    /// Social-channel leads may not have a formal lead id yet; the
    /// phone/email fallback preserves correlation for those. A record with
    /// none of the three is inert.
    pub fn effective_identity(&self) -> Option<&str> {
        [&self.lead_id, &self.phone, &self.email]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Event time resolution order: conversion time, else last update,
    /// else creation time.
    pub fn resolved_conversion_time(&self) -> Option<&str> {
        self.conversion_at
            .as_deref()
            .or(self.updated_at.as_deref())
            .or(self.created_at.as_deref())
    }
}

/// Boolean-like column that upstream stores inconsistently.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CustomerFlag {
    Bool(bool),
    Text(String),
}

impl CustomerFlag {
    /// True only for `true` or the exact string "TRUE".
    pub fn is_returning(&self) -> bool {
        match self {
            CustomerFlag::Bool(b) => *b,
            CustomerFlag::Text(s) => s == "TRUE",
        }
    }
}

/// Durable, append-only proof that a given event id was submitted.
///
/// `event_id` is the natural key; the conditional insert on it is the
/// at-most-once gate for dispatch.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DispatchRecord {
    pub event_id: String,
    /// The effective identity used (lead id, or phone/email fallback).
    pub lead_ref: String,
    pub status: String,
    pub event_name: String,
    pub value: f64,
    pub sent_at: DateTime<Utc>,
    pub conversion_time: Option<DateTime<Utc>>,
}

/// Lead rows flagged with a non-empty diagnostic column, for the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiagnosticRow {
    pub lead_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub diagnostic: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Query parameters accepted by the webhook endpoint.
#[derive(Debug, Deserialize)]
pub struct WebhookAuthParams {
    #[serde(default)]
    pub secret: Option<String>,
}

/// Body of `GET /api/v1/events/logs`.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub data: LogsData,
}

#[derive(Debug, Serialize)]
pub struct LogsData {
    pub success_logs: Vec<DispatchRecord>,
    pub error_logs: Vec<DiagnosticRow>,
}
