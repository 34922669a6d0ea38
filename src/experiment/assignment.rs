//! Experiment assignment - sticky (experiment, user) -> variant mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a user ended up in their variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentReason {
    /// Weighted random selection.
    Random,
    /// Caller forced a specific variant.
    Forced,
    /// Manual override outside the engine.
    Override,
}

/// A stored assignment row.
///
/// A (experiment, user) pair is assigned exactly once for the lifetime of
/// the experiment; only the exposure-tracking fields are ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentAssignment {
    /// Row id.
    pub id: String,
    /// Parent experiment id.
    pub experiment_id: String,
    /// Assigned variant id. Never changes once set.
    pub variant_id: String,
    /// Assigned user id.
    pub user_id: String,
    /// Assignment timestamp.
    pub assigned_at: DateTime<Utc>,
    /// How the variant was chosen.
    pub assignment_reason: AssignmentReason,
    /// First time the user saw the variant.
    pub first_exposure_at: Option<DateTime<Utc>>,
    /// Most recent time the user saw the variant.
    pub last_exposure_at: Option<DateTime<Utc>>,
    /// Number of times the user was exposed. Monotonically increasing.
    pub exposure_count: u64,
}

/// Fields for a new assignment row.
///
/// The store assigns the id, stamps `assigned_at`, sets both exposure
/// timestamps to now, and starts `exposure_count` at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    /// Parent experiment id.
    pub experiment_id: String,
    /// Selected variant id.
    pub variant_id: String,
    /// Assigned user id.
    pub user_id: String,
    /// How the variant was chosen.
    pub assignment_reason: AssignmentReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_lowercase() {
        let json = serde_json::to_string(&AssignmentReason::Forced).unwrap();
        assert_eq!(json, "\"forced\"");
    }
}
