//! The event-decision-and-dispatch pipeline.
//!
//! Each notification is an independent, short-lived unit of work:
//! change detection -> classification -> eligibility filters -> dedup gate
//! -> payload build -> outbound dispatch -> durable record + diagnostic
//! write-back. All business outcomes resolve to a success-shaped result;
//! only auth, transport and internal faults become errors.

use crate::change::{self, ChangeDecision};
use crate::errors::{AppError, ResultExt};
use crate::events::passes_score_filter;
use crate::handlers::AppState;
use crate::meta_models::{ConversionEvent, CustomData, EventPayload, UserData};
use crate::models::{ChangeNotification, DispatchRecord, LeadRecord};
use crate::normalize;
use crate::storage::RelayStorage;
use chrono::Utc;
use std::sync::Arc;

/// Resolution of one change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to process (no identity, no meaningful change, loop).
    Ignored { reason: String },
    /// Classified but filtered out (unmapped, low score, stale, duplicate).
    Skipped { reason: String },
    /// One event was submitted and durably recorded.
    Dispatched {
        event_id: String,
        used_id: String,
        events_received: Option<i64>,
    },
}

/// Processes a single change notification end to end.
///
/// Returns `Err` only for dispatch/database/internal faults; everything
/// else is a 200-shaped [`Outcome`] the upstream producer must not retry.
pub async fn process_notification(
    state: &Arc<AppState>,
    notification: ChangeNotification,
) -> Result<Outcome, AppError> {
    let storage = RelayStorage::new(state.db.clone());

    // 1. A notification without lead data or identity is inert.
    let Some(record) = notification.record else {
        return Ok(Outcome::Ignored {
            reason: "Ignored: No lead data in notification".to_string(),
        });
    };
    let Some(effective_id) = record.effective_identity().map(String::from) else {
        return Ok(Outcome::Ignored {
            reason: "Ignored: No identifying data (lead_id, phone, or email)".to_string(),
        });
    };

    // 2. Change detection and loop prevention.
    if let ChangeDecision::Ignored(reason) = change::evaluate(
        notification.change_type,
        &record,
        notification.old_record.as_ref(),
    ) {
        tracing::debug!("Notification for {} ignored: {}", effective_id, reason);
        return Ok(Outcome::Ignored {
            reason: reason.to_string(),
        });
    }

    let lead_id = record.lead_id.clone().unwrap_or_default();
    let status = record.status.clone().unwrap_or_default();

    // 3. Classify the status into a conversion event.
    let Some(event_def) = state.config.event_map.classify(&status).cloned() else {
        let reason = format!("Status '{}' not mapped to an event", status);
        storage.log_skip_reason(&lead_id, &reason).await;
        return Ok(Outcome::Skipped { reason });
    };

    // 4. Eligibility filters: score, then event age.
    if !passes_score_filter(record.score, state.config.min_lead_score) {
        let reason = format!("Skipped: Low score ({})", record.score.unwrap_or(0));
        storage.log_skip_reason(&lead_id, &reason).await;
        return Ok(Outcome::Skipped { reason });
    }

    let conversion_date = record.resolved_conversion_time().map(String::from);
    if normalize::is_older_than(conversion_date.as_deref(), state.config.max_event_age_days) {
        let reason = format!(
            "Skipped: Event too old (> {} days)",
            state.config.max_event_age_days
        );
        storage.log_skip_reason(&lead_id, &reason).await;
        return Ok(Outcome::Skipped { reason });
    }

    // 5. Deterministic event id from the effective identity, so leads
    // without a formal id still dedup consistently across retries.
    let event_id =
        normalize::generate_event_id(&effective_id, &status, conversion_date.as_deref());

    // 6. Durable dedup check (authoritative across restarts).
    if storage
        .event_exists(&event_id)
        .await
        .context("checking dispatch dedup index")?
    {
        let reason = "Skipped: Event already sent (deduplicated)".to_string();
        storage.log_skip_reason(&lead_id, &reason).await;
        return Ok(Outcome::Skipped { reason });
    }

    // 7. In-flight guard: of N concurrent deliveries of the same event in
    // this process, only the one that created the entry dispatches.
    let claim = state
        .inflight
        .entry(event_id.clone())
        .or_insert(Utc::now().timestamp())
        .await;
    if !claim.is_fresh() {
        let reason = "Skipped: Event dispatch already in flight".to_string();
        return Ok(Outcome::Skipped { reason });
    }

    // 8. Build and submit the payload.
    let user_data = UserData::from_lead(&record, &effective_id);
    let quality = QualityFlags::observe(&record, &user_data);
    let custom_data = CustomData::from_lead(&record, event_def.value, &state.config.currency);

    let payload = EventPayload {
        data: vec![ConversionEvent {
            event_name: event_def.event_name.clone(),
            event_time: normalize::to_unix_seconds(conversion_date.as_deref()),
            event_id: event_id.clone(),
            action_source: "website".to_string(),
            user_data,
            custom_data,
            event_source_url: record.source_url.clone(),
        }],
        access_token: state.config.meta_access_token.clone(),
    };

    let api_result = match state.meta_client.send_events(&payload).await {
        Ok(result) => result,
        Err(e) => {
            // No dispatch record is written, so the event stays eligible
            // for the upstream producer's resubmission.
            storage.write_dispatch_failure(&lead_id, &e.to_string()).await;
            state.inflight.invalidate(&event_id).await;
            return Err(e);
        }
    };

    // 9. Durably record the dispatch; the conditional insert is the
    // at-most-once gate for anything that slipped past the earlier checks.
    let dispatch_record = DispatchRecord {
        event_id: event_id.clone(),
        lead_ref: effective_id.clone(),
        status: status.clone(),
        event_name: event_def.event_name.clone(),
        value: event_def.value,
        sent_at: Utc::now(),
        conversion_time: conversion_date.as_deref().and_then(normalize::parse_timestamp),
    };
    let inserted = match storage.record_dispatch(&dispatch_record).await {
        Ok(inserted) => inserted,
        Err(e) => {
            // Release the claim so a resubmission retries the record write
            // instead of being answered with an in-flight skip.
            state.inflight.invalidate(&event_id).await;
            return Err(e).context("recording dispatch");
        }
    };
    if !inserted {
        tracing::warn!(
            "Dispatch record for event {} already present; concurrent delivery submitted it first",
            event_id
        );
    }

    storage
        .write_quality_summary(&lead_id, &quality.summary())
        .await;
    state.inflight.invalidate(&event_id).await;

    let events_received = api_result
        .get("events_received")
        .and_then(|v| v.as_i64());
    tracing::info!(
        "Dispatched event {} for {} (events_received={:?})",
        event_id,
        effective_id,
        events_received
    );

    Ok(Outcome::Dispatched {
        event_id,
        used_id: effective_id,
        events_received,
    })
}

/// Data-quality observations written back after a successful dispatch.
/// Consumed by the external dashboard through the diagnostic column.
struct QualityFlags {
    has_ip: bool,
    has_ua: bool,
    has_fbp: bool,
    probable_lead_ad: bool,
}

impl QualityFlags {
    fn observe(record: &LeadRecord, user_data: &UserData) -> Self {
        // Best-effort origin hint, not a correctness-critical branch:
        // an all-numeric id with no click/browser cookies usually means a
        // lead-ad form submission. There is no authoritative source field.
        let numeric_id = record
            .lead_id
            .as_deref()
            .map(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        let no_cookies =
            record.fbp.is_none() && record.fbc.is_none() && record.fbclid.is_none();

        Self {
            has_ip: user_data.client_ip_address.is_some(),
            has_ua: user_data.client_user_agent.is_some(),
            has_fbp: user_data.fbp.is_some(),
            probable_lead_ad: numeric_id && no_cookies,
        }
    }

    fn summary(&self) -> String {
        let yn = |b: bool| if b { "yes" } else { "no" };
        let mut summary = format!(
            "Sent OK (ip={}, ua={}, fbp={})",
            yn(self.has_ip),
            yn(self.has_ua),
            yn(self.has_fbp)
        );
        if self.probable_lead_ad {
            summary.push_str(" | probable lead-ad origin (no browser cookies)");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_summary_flags() {
        let record = LeadRecord {
            lead_id: Some("12345".to_string()),
            client_ip: Some("203.0.113.7".to_string()),
            ..Default::default()
        };
        let user_data = UserData::from_lead(&record, "12345");
        let flags = QualityFlags::observe(&record, &user_data);
        assert_eq!(
            flags.summary(),
            "Sent OK (ip=yes, ua=no, fbp=no) | probable lead-ad origin (no browser cookies)"
        );
    }

    #[test]
    fn test_quality_summary_with_cookies_is_not_lead_ad() {
        let record = LeadRecord {
            lead_id: Some("12345".to_string()),
            fbp: Some("fb.1.1700000000.123".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ..Default::default()
        };
        let user_data = UserData::from_lead(&record, "12345");
        let flags = QualityFlags::observe(&record, &user_data);
        assert_eq!(flags.summary(), "Sent OK (ip=no, ua=yes, fbp=yes)");
    }

    #[test]
    fn test_non_numeric_id_is_not_lead_ad() {
        let record = LeadRecord {
            lead_id: Some("L1".to_string()),
            ..Default::default()
        };
        let user_data = UserData::from_lead(&record, "L1");
        let flags = QualityFlags::observe(&record, &user_data);
        assert!(!flags.probable_lead_ad);
    }
}
