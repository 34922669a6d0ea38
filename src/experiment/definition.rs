//! Experiment - root entity of the A/B testing schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::UserProfile;
use super::variant::VariantDraft;

/// Lifecycle status of an experiment.
///
/// Transitions are guarded by conditional store writes:
/// `Draft -> Running -> Paused`, any status `-> Completed`, and
/// `Completed -> Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Defined but not yet accepting users.
    Draft,
    /// Actively assigning users to variants.
    Running,
    /// Temporarily stopped; existing assignments stay valid.
    Paused,
    /// Concluded, optionally with a declared winner.
    Completed,
    /// Retired from all listings.
    Archived,
}

/// Audience filter for an experiment.
///
/// All populated fields must match for a user to be eligible. An empty
/// audience matches everyone, and a user with no known profile is treated
/// as eligible (the filter is soft).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetAudience {
    /// Roles allowed into the experiment; empty means any role.
    pub roles: Vec<String>,
    /// Course ids the user must be enrolled in one of; empty means any.
    pub courses: Vec<String>,
    /// Minimum number of active days on the platform.
    pub min_activity_days: Option<u32>,
    /// Free-form filters evaluated by downstream consumers, not here.
    pub custom_filters: serde_json::Map<String, serde_json::Value>,
}

impl TargetAudience {
    /// Check whether a user profile satisfies every populated filter.
    ///
    /// `custom_filters` are carried but not evaluated; they are opaque to
    /// the engine.
    #[must_use]
    pub fn matches(&self, profile: &UserProfile) -> bool {
        if !self.roles.is_empty() && !self.roles.iter().any(|r| profile.roles.contains(r)) {
            return false;
        }
        if !self.courses.is_empty() && !self.courses.iter().any(|c| profile.courses.contains(c)) {
            return false;
        }
        if let Some(min_days) = self.min_activity_days {
            if profile.active_days < min_days {
                return false;
            }
        }
        true
    }
}

/// A stored experiment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Row id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// The hypothesis being tested.
    pub hypothesis: Option<String>,
    /// Lifecycle status.
    pub status: ExperimentStatus,
    /// Audience filter.
    pub target_audience: TargetAudience,
    /// Fraction of eligible users enrolled, in percent (0-100).
    pub traffic_percentage: f64,
    /// Stamped when the experiment starts running.
    pub start_date: Option<DateTime<Utc>>,
    /// Stamped when the experiment completes.
    pub end_date: Option<DateTime<Utc>>,
    /// Name of the metric the experiment is judged on.
    pub primary_metric: String,
    /// Additional metrics tracked alongside the primary one.
    pub secondary_metrics: Vec<String>,
    /// Stopping rule: total exposed users required before a call is made.
    pub minimum_sample_size: u64,
    /// Stopping rule: smallest lift worth acting on, as a fraction (0.05 = 5%).
    pub minimum_effect_size: f64,
    /// Variant declared the winner at completion, if any.
    pub winner_variant_id: Option<String>,
    /// Stamped at completion.
    pub concluded_at: Option<DateTime<Utc>>,
    /// Free-form notes recorded at completion.
    pub conclusion_notes: Option<String>,
    /// User who created the experiment.
    pub created_by: Option<String>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last row update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Resolved experiment fields handed to the store for insertion.
///
/// Produced by the assignment engine after validating an
/// [`ExperimentDraft`]; the store assigns the id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExperiment {
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// The hypothesis being tested.
    pub hypothesis: Option<String>,
    /// Audience filter.
    pub target_audience: TargetAudience,
    /// Fraction of eligible users enrolled, in percent (0-100).
    pub traffic_percentage: f64,
    /// Name of the metric the experiment is judged on.
    pub primary_metric: String,
    /// Additional metrics tracked alongside the primary one.
    pub secondary_metrics: Vec<String>,
    /// Total exposed users required before a call is made.
    pub minimum_sample_size: u64,
    /// Smallest lift worth acting on, as a fraction.
    pub minimum_effect_size: f64,
    /// User who created the experiment.
    pub created_by: Option<String>,
}

/// Conditional status-transition payload.
///
/// Fields set to `None` are left untouched by the store; `updated_at` is
/// always stamped.
#[derive(Debug, Clone, Default)]
pub struct ExperimentUpdate {
    /// New lifecycle status.
    pub status: Option<ExperimentStatus>,
    /// Start timestamp to record.
    pub start_date: Option<DateTime<Utc>>,
    /// End timestamp to record.
    pub end_date: Option<DateTime<Utc>>,
    /// Winner variant to record.
    pub winner_variant_id: Option<String>,
    /// Conclusion notes to record.
    pub conclusion_notes: Option<String>,
    /// Conclusion timestamp to record.
    pub concluded_at: Option<DateTime<Utc>>,
}

/// Options for creating an experiment, including its variants.
#[derive(Debug, Clone)]
pub struct ExperimentDraft {
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// The hypothesis being tested.
    pub hypothesis: Option<String>,
    /// Name of the metric the experiment is judged on.
    pub primary_metric: String,
    /// Additional metrics tracked alongside the primary one.
    pub secondary_metrics: Vec<String>,
    /// Audience filter; defaults to everyone.
    pub target_audience: TargetAudience,
    /// Enrollment percentage; defaults to 100.
    pub traffic_percentage: Option<f64>,
    /// Sample-size stopping rule; defaults to 100 users.
    pub minimum_sample_size: Option<u64>,
    /// Effect-size stopping rule; defaults to 0.05.
    pub minimum_effect_size: Option<f64>,
    /// Variant definitions; at least two, exactly one control.
    pub variants: Vec<VariantDraft>,
}

impl ExperimentDraft {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        primary_metric: impl Into<String>,
    ) -> ExperimentDraftBuilder {
        ExperimentDraftBuilder::new(name, primary_metric)
    }
}

/// Builder for [`ExperimentDraft`].
#[derive(Debug)]
pub struct ExperimentDraftBuilder {
    draft: ExperimentDraft,
}

impl ExperimentDraftBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_metric: impl Into<String>) -> Self {
        Self {
            draft: ExperimentDraft {
                name: name.into(),
                description: None,
                hypothesis: None,
                primary_metric: primary_metric.into(),
                secondary_metrics: Vec::new(),
                target_audience: TargetAudience::default(),
                traffic_percentage: None,
                minimum_sample_size: None,
                minimum_effect_size: None,
                variants: Vec::new(),
            },
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = Some(description.into());
        self
    }

    /// Set the hypothesis.
    #[must_use]
    pub fn hypothesis(mut self, hypothesis: impl Into<String>) -> Self {
        self.draft.hypothesis = Some(hypothesis.into());
        self
    }

    /// Add a secondary metric.
    #[must_use]
    pub fn secondary_metric(mut self, metric: impl Into<String>) -> Self {
        self.draft.secondary_metrics.push(metric.into());
        self
    }

    /// Set the audience filter.
    #[must_use]
    pub fn target_audience(mut self, audience: TargetAudience) -> Self {
        self.draft.target_audience = audience;
        self
    }

    /// Set the enrollment percentage (0-100).
    #[must_use]
    pub const fn traffic_percentage(mut self, percentage: f64) -> Self {
        self.draft.traffic_percentage = Some(percentage);
        self
    }

    /// Set the minimum sample size stopping rule.
    #[must_use]
    pub const fn minimum_sample_size(mut self, size: u64) -> Self {
        self.draft.minimum_sample_size = Some(size);
        self
    }

    /// Set the minimum effect size stopping rule (fraction, 0.05 = 5%).
    #[must_use]
    pub const fn minimum_effect_size(mut self, size: f64) -> Self {
        self.draft.minimum_effect_size = Some(size);
        self
    }

    /// Add a variant definition.
    #[must_use]
    pub fn variant(mut self, variant: VariantDraft) -> Self {
        self.draft.variants.push(variant);
        self
    }

    /// Build the draft.
    #[must_use]
    pub fn build(self) -> ExperimentDraft {
        self.draft
    }
}
