//! Derived per-variant metrics and analysis results
//!
//! Nothing here is persisted; metrics are recomputed on demand from the
//! assignment and event rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment::ExperimentAssignment;
use super::definition::Experiment;
use super::variant::ExperimentVariant;

/// Aggregate metrics for one variant of an experiment.
///
/// Comparison fields (`lift_vs_control`, the confidence interval, `p_value`)
/// are populated only on non-control variants, and only when the control
/// converts and both groups clear the small-sample floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    /// Parent experiment id.
    pub experiment_id: String,
    /// Variant id these metrics describe.
    pub variant_id: String,
    /// Variant name, for display.
    pub variant_name: String,
    /// Whether this is the control arm.
    pub is_control: bool,
    /// Users assigned to the variant.
    pub total_users: u64,
    /// Assigned users with at least one exposure.
    pub exposed_users: u64,
    /// Distinct users with at least one conversion event.
    pub converted_users: u64,
    /// `exposed_users / total_users`; 0 when nobody is assigned.
    pub exposure_rate: f64,
    /// `converted_users / exposed_users`; 0 when nobody is exposed.
    pub conversion_rate: f64,
    /// Mean of conversion event values, when any carry a value.
    pub metric_mean: Option<f64>,
    /// Sample standard deviation (n-1) of conversion event values.
    pub metric_std_dev: Option<f64>,
    /// Median of conversion event values.
    pub metric_median: Option<f64>,
    /// Relative conversion-rate change vs control, in percent.
    pub lift_vs_control: Option<f64>,
    /// Lower bound of the 95% CI on the rate difference, in percentage points.
    pub confidence_interval_lower: Option<f64>,
    /// Upper bound of the 95% CI on the rate difference, in percentage points.
    pub confidence_interval_upper: Option<f64>,
    /// Two-tailed p-value of the pooled two-proportion z-test.
    pub p_value: Option<f64>,
    /// Whether the rate difference is significant at alpha = 0.05.
    pub is_significant: bool,
    /// When the metrics were computed.
    pub calculated_at: DateTime<Utc>,
}

/// Full analysis output for an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    /// The experiment under analysis.
    pub experiment: Experiment,
    /// All variants of the experiment.
    pub variants: Vec<ExperimentVariant>,
    /// Per-variant metrics, one entry per variant.
    pub metrics: Vec<ExperimentMetrics>,
    /// Natural-language verdict on the experiment so far.
    pub recommendation: String,
    /// `max(1 - p_value)` over significant variants, in percent; 0 when
    /// nothing is significant.
    pub confidence: f64,
}

/// A user's membership in one running experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExperiment {
    /// The running experiment.
    pub experiment: Experiment,
    /// The variant the user is in.
    pub variant: ExperimentVariant,
    /// The underlying assignment row.
    pub assignment: ExperimentAssignment,
}
