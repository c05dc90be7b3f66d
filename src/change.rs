//! Decides whether a change notification is worth processing.
//!
//! The dispatcher writes its outcome back onto the same row it was
//! triggered from, so every dispatch produces a follow-up UPDATE
//! notification. Without the loop-prevention rule below, that write-back
//! would re-trigger processing forever.

use crate::models::{ChangeType, LeadRecord};
use crate::normalize::parse_timestamp;

/// Outcome of change evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDecision {
    Proceed,
    /// Short-circuit with a 200 "ignored" response; never an error.
    Ignored(&'static str),
}

/// Evaluates whether a notification represents a meaningful change.
///
/// - INSERT always proceeds (no prior state to compare).
/// - UPDATE without an old snapshot proceeds (process rather than drop).
/// - UPDATE with an old snapshot first applies the loop-prevention rule,
///   then requires either the status label or the conversion timestamp to
///   have actually changed.
pub fn evaluate(
    change_type: ChangeType,
    record: &LeadRecord,
    old_record: Option<&LeadRecord>,
) -> ChangeDecision {
    if change_type == ChangeType::Insert {
        return ChangeDecision::Proceed;
    }
    let Some(old) = old_record else {
        return ChangeDecision::Proceed;
    };

    // If the only thing that changed was the diagnostic column (our own
    // write-back), ignore the notification to break the feedback cycle.
    if record.diagnostic != old.diagnostic
        && record.status == old.status
        && record.conversion_at == old.conversion_at
    {
        return ChangeDecision::Ignored("Ignored: Loop prevention (diagnostic update)");
    }

    let status_changed = record.status != old.status;

    // Conversion timestamps are compared as resolved instants, not raw
    // strings; absent or unparseable values normalize to epoch zero.
    let new_ts = instant_millis(record.conversion_at.as_deref());
    let old_ts = instant_millis(old.conversion_at.as_deref());
    let date_changed = new_ts != old_ts;

    if !status_changed && !date_changed {
        return ChangeDecision::Ignored("Ignored: No change in status or conversion time");
    }

    ChangeDecision::Proceed
}

fn instant_millis(date_str: Option<&str>) -> i64 {
    date_str
        .and_then(parse_timestamp)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: &str, conversion: Option<&str>, diagnostic: Option<&str>) -> LeadRecord {
        LeadRecord {
            lead_id: Some("L1".to_string()),
            status: Some(status.to_string()),
            conversion_at: conversion.map(String::from),
            diagnostic: diagnostic.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_always_proceeds() {
        let record = lead("Nuevo Lead", None, None);
        assert_eq!(
            evaluate(ChangeType::Insert, &record, None),
            ChangeDecision::Proceed
        );
    }

    #[test]
    fn test_update_without_old_snapshot_proceeds() {
        let record = lead("Nuevo Lead", None, None);
        assert_eq!(
            evaluate(ChangeType::Update, &record, None),
            ChangeDecision::Proceed
        );
    }

    #[test]
    fn test_diagnostic_only_change_is_loop_suppressed() {
        let old = lead("Nuevo Lead", Some("2025-01-01T00:00:00Z"), None);
        let new = lead(
            "Nuevo Lead",
            Some("2025-01-01T00:00:00Z"),
            Some("Sent OK (ip=yes, ua=yes, fbp=no)"),
        );
        assert!(matches!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Ignored(reason) if reason.contains("Loop prevention")
        ));
    }

    #[test]
    fn test_no_meaningful_change_is_ignored() {
        let old = lead("Nuevo Lead", Some("2025-01-01T00:00:00Z"), None);
        let new = lead("Nuevo Lead", Some("2025-01-01T00:00:00Z"), None);
        assert!(matches!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Ignored(reason) if reason.contains("No change")
        ));
    }

    #[test]
    fn test_equivalent_instants_in_different_notation_are_no_change() {
        // Same instant, different offset notation: no change.
        let old = lead("Nuevo Lead", Some("2025-01-01T00:00:00Z"), None);
        let new = lead("Nuevo Lead", Some("2025-01-01T01:00:00+01:00"), None);
        assert!(matches!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Ignored(_)
        ));
    }

    #[test]
    fn test_status_change_proceeds() {
        let old = lead("Nuevo Lead", Some("2025-01-01T00:00:00Z"), None);
        let new = lead("Lead contactado", Some("2025-01-01T00:00:00Z"), None);
        assert_eq!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Proceed
        );
    }

    #[test]
    fn test_conversion_time_change_proceeds() {
        let old = lead("Nuevo Lead", None, None);
        let new = lead("Nuevo Lead", Some("2025-01-02T00:00:00Z"), None);
        assert_eq!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Proceed
        );
    }

    #[test]
    fn test_diagnostic_change_with_status_change_still_proceeds() {
        let old = lead("Nuevo Lead", None, Some("LOG: Skipped: Low score (0)"));
        let new = lead("Lead contactado", None, None);
        assert_eq!(
            evaluate(ChangeType::Update, &new, Some(&old)),
            ChangeDecision::Proceed
        );
    }
}
