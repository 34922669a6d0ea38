//! Analysis engine - per-variant metrics, significance, recommendation

use std::collections::HashSet;

use chrono::Utc;

use crate::experiment::{
    EventType, Experiment, ExperimentMetrics, ExperimentResults, ExperimentVariant,
};
use crate::stats::{self, MIN_GROUP_SIZE, Z_95, two_proportion_z_test};
use crate::store::ExperimentStore;
use crate::Result;

/// Aggregates assignment and event rows into per-variant metrics and a
/// verdict.
///
/// Metrics are recomputed from the raw rows on every call; nothing is
/// cached or persisted.
#[derive(Debug)]
pub struct AnalysisEngine<S> {
    store: S,
}

impl<S: ExperimentStore> AnalysisEngine<S> {
    /// Create an engine over the given store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Compute full results for an experiment, or `Ok(None)` when the
    /// experiment does not exist.
    ///
    /// Per variant: assignment and exposure counts, distinct-user
    /// conversions, rates, and value statistics. Non-control variants are
    /// compared against the control when the control converts at all:
    /// relative lift always, and - once both groups have at least
    /// [`MIN_GROUP_SIZE`] exposed users - a pooled two-proportion z-test
    /// with a 95% confidence interval on the rate difference. Below the
    /// floor no test runs and `p_value` stays unset.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn experiment_results(
        &self,
        experiment_id: &str,
    ) -> Result<Option<ExperimentResults>> {
        let Some(experiment) = self.store.get_experiment(experiment_id).await? else {
            return Ok(None);
        };
        let variants = self.store.variants_for_experiment(experiment_id).await?;

        let mut metrics = Vec::with_capacity(variants.len());
        for variant in &variants {
            metrics.push(self.variant_metrics(experiment_id, variant).await?);
        }

        let control = metrics.iter().find(|m| m.is_control).cloned();
        if let Some(control) = control {
            if control.conversion_rate > 0.0 {
                for metric in metrics.iter_mut().filter(|m| !m.is_control) {
                    compare_to_control(metric, &control);
                }
            }
        }

        let recommendation = recommendation(&experiment, &metrics);
        let confidence = metrics
            .iter()
            .filter(|m| m.is_significant)
            .filter_map(|m| m.p_value)
            .map(|p| 1.0 - p)
            .fold(0.0, f64::max)
            * 100.0;

        Ok(Some(ExperimentResults {
            experiment,
            variants,
            metrics,
            recommendation,
            confidence,
        }))
    }

    /// Base metrics for one variant, before any control comparison.
    #[allow(clippy::cast_precision_loss)]
    async fn variant_metrics(
        &self,
        experiment_id: &str,
        variant: &ExperimentVariant,
    ) -> Result<ExperimentMetrics> {
        let assignments = self
            .store
            .assignments_for_variant(experiment_id, &variant.id)
            .await?;
        let total_users = assignments.len() as u64;
        let exposed_users = assignments.iter().filter(|a| a.exposure_count > 0).count() as u64;

        let conversions = self
            .store
            .events_of_type(experiment_id, &variant.id, EventType::Conversion)
            .await?;
        // A user converting several times counts once
        let converted_users = conversions
            .iter()
            .map(|e| e.user_id.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;

        let exposure_rate = if total_users > 0 {
            exposed_users as f64 / total_users as f64
        } else {
            0.0
        };
        let conversion_rate = if exposed_users > 0 {
            converted_users as f64 / exposed_users as f64
        } else {
            0.0
        };

        let values: Vec<f64> = conversions.iter().filter_map(|e| e.event_value).collect();

        Ok(ExperimentMetrics {
            experiment_id: experiment_id.to_string(),
            variant_id: variant.id.clone(),
            variant_name: variant.name.clone(),
            is_control: variant.is_control,
            total_users,
            exposed_users,
            converted_users,
            exposure_rate,
            conversion_rate,
            metric_mean: stats::mean(&values),
            metric_std_dev: stats::sample_std_dev(&values),
            metric_median: stats::median(&values),
            lift_vs_control: None,
            confidence_interval_lower: None,
            confidence_interval_upper: None,
            p_value: None,
            is_significant: false,
            calculated_at: Utc::now(),
        })
    }
}

/// Fill in the control-relative fields of a treatment metric.
///
/// The caller guarantees `control.conversion_rate > 0`.
fn compare_to_control(metric: &mut ExperimentMetrics, control: &ExperimentMetrics) {
    metric.lift_vs_control = Some(
        (metric.conversion_rate - control.conversion_rate) / control.conversion_rate * 100.0,
    );

    // Hard floor for the normal approximation, not a continuity correction
    if metric.exposed_users < MIN_GROUP_SIZE || control.exposed_users < MIN_GROUP_SIZE {
        return;
    }

    let test = two_proportion_z_test(
        metric.conversion_rate,
        metric.exposed_users,
        control.conversion_rate,
        control.exposed_users,
    );
    metric.p_value = Some(test.p_value);
    metric.is_significant = test.is_significant();

    let diff = metric.conversion_rate - control.conversion_rate;
    let margin = Z_95 * test.std_error;
    metric.confidence_interval_lower = Some((diff - margin) * 100.0);
    metric.confidence_interval_upper = Some((diff + margin) * 100.0);
}

/// Natural-language verdict for the experiment so far.
fn recommendation(experiment: &Experiment, metrics: &[ExperimentMetrics]) -> String {
    let total_exposed: u64 = metrics.iter().map(|m| m.exposed_users).sum();
    if total_exposed < experiment.minimum_sample_size {
        return format!(
            "Insufficient sample size. Need {} samples, currently have {}. \
             Continue running the experiment.",
            experiment.minimum_sample_size, total_exposed
        );
    }

    let has_control = metrics.iter().any(|m| m.is_control);
    // Ranking treatments by (rate - control rate) reduces to rate ordering
    let best = metrics
        .iter()
        .filter(|m| !m.is_control)
        .max_by(|a, b| a.conversion_rate.total_cmp(&b.conversion_rate));
    let (true, Some(best)) = (has_control, best) else {
        return "Unable to determine recommendation. Check experiment setup.".to_string();
    };

    let lift = best.lift_vs_control.unwrap_or(0.0);
    if best.is_significant && lift > experiment.minimum_effect_size * 100.0 {
        return format!(
            "Winner: \"{}\" outperforms control by {:.1}% (p < 0.05). \
             Recommend implementing the winning variant.",
            best.variant_name, lift
        );
    }
    if best.is_significant && lift < 0.0 {
        return format!(
            "Control wins. Treatment \"{}\" underperforms by {:.1}% (p < 0.05). \
             Recommend keeping the control.",
            best.variant_name,
            lift.abs()
        );
    }

    let sign = if lift > 0.0 { "+" } else { "" };
    format!(
        "No significant difference detected. Lift is {sign}{lift:.1}% but not \
         statistically significant. Consider running longer or accepting the \
         null hypothesis."
    )
}
