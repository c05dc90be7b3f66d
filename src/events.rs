//! Maps lead status labels to conversion event definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static mapping from a status label to a conversion event.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventDefinition {
    pub event_name: String,
    pub value: f64,
}

/// Status label -> event definition table, loaded once at startup.
///
/// Lookups are exact first, then case-insensitive, to tolerate
/// inconsistent capitalization from upstream data entry.
#[derive(Debug, Clone)]
pub struct EventMap {
    entries: HashMap<String, EventDefinition>,
}

impl Default for EventMap {
    fn default() -> Self {
        let entries = [
            ("Nuevo Lead", "Lead", 5.0),
            ("Lead contactado", "Contact", 25.0),
            ("Cita agendada", "Schedule", 75.0),
            ("En proceso de venta", "InitiateCheckout", 150.0),
            ("Venta cerrada", "Purchase", 500.0),
            ("Nueva Venta con el mismo cliente", "Purchase", 750.0),
        ]
        .into_iter()
        .map(|(status, event_name, value)| {
            (
                status.to_string(),
                EventDefinition {
                    event_name: event_name.to_string(),
                    value,
                },
            )
        })
        .collect();

        Self { entries }
    }
}

impl EventMap {
    /// Parses a `{ "<status>": { "event_name": ..., "value": ... } }` JSON
    /// override, used by the `EVENT_MAPPING` environment variable.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, EventDefinition> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Resolves a status label to its event definition.
    ///
    /// `None` is a normal, non-error outcome ("status not mapped").
    pub fn classify(&self, status: &str) -> Option<&EventDefinition> {
        if let Some(def) = self.entries.get(status) {
            return Some(def);
        }
        let wanted = status.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| key.trim().to_lowercase() == wanted)
            .map(|(_, def)| def)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Score eligibility: absent scores count as zero.
pub fn passes_score_filter(score: Option<i64>, min_score: i64) -> bool {
    score.unwrap_or(0) >= min_score
}
