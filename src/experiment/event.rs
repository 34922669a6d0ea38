//! Experiment event - append-only behavioral record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of behavioral event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// The user saw the variant. Written once per new assignment.
    Exposure,
    /// The user clicked a tracked element.
    Click,
    /// The user performed the experiment's goal action.
    Conversion,
    /// The user finished a tracked flow.
    Completion,
    /// Caller-defined event, named via `event_name`.
    Custom,
}

/// A stored event row. Events are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEvent {
    /// Row id.
    pub id: String,
    /// Parent experiment id.
    pub experiment_id: String,
    /// Variant the event is attributed to.
    pub variant_id: String,
    /// User who produced the event.
    pub user_id: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Caller-supplied event name.
    pub event_name: Option<String>,
    /// Numeric value (revenue, duration) for metric statistics.
    pub event_value: Option<f64>,
    /// Free-form metadata.
    pub event_metadata: serde_json::Map<String, serde_json::Value>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Fields for a new event row. The store assigns the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    /// Parent experiment id.
    pub experiment_id: String,
    /// Variant the event is attributed to.
    pub variant_id: String,
    /// User who produced the event.
    pub user_id: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Caller-supplied event name.
    pub event_name: Option<String>,
    /// Numeric value for metric statistics.
    pub event_value: Option<f64>,
    /// Free-form metadata.
    pub event_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Optional details attached to a tracked event.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    /// Caller-supplied event name.
    pub event_name: Option<String>,
    /// Numeric value for metric statistics.
    pub event_value: Option<f64>,
    /// Free-form metadata.
    pub event_metadata: serde_json::Map<String, serde_json::Value>,
}

impl EventOptions {
    /// Options carrying only a numeric value.
    #[must_use]
    pub fn with_value(value: f64) -> Self {
        Self {
            event_value: Some(value),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serializes_lowercase() {
        let json = serde_json::to_string(&EventType::Conversion).unwrap();
        assert_eq!(json, "\"conversion\"");
    }

    #[test]
    fn test_with_value() {
        let options = EventOptions::with_value(42.0);
        assert_eq!(options.event_value, Some(42.0));
        assert!(options.event_name.is_none());
        assert!(options.event_metadata.is_empty());
    }
}
