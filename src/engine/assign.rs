//! Assignment engine - lifecycle, sticky assignment, event tracking

use chrono::Utc;
use rand::{thread_rng, Rng};
use tracing::{debug, warn};

use crate::experiment::{
    AssignmentReason, EventOptions, EventType, Experiment, ExperimentDraft, ExperimentStatus,
    ExperimentUpdate, ExperimentVariant, NewAssignment, NewEvent, NewExperiment, NewVariant,
    UserExperiment,
};
use crate::store::ExperimentStore;
use crate::{Error, Result};

const DEFAULT_TRAFFIC_PERCENTAGE: f64 = 100.0;
const DEFAULT_MINIMUM_SAMPLE_SIZE: u64 = 100;
const DEFAULT_MINIMUM_EFFECT_SIZE: f64 = 0.05;

/// Creates experiments, drives their lifecycle, and hands out sticky
/// variant assignments.
///
/// The engine holds no state of its own; everything lives in the injected
/// store, so one engine instance can serve any number of concurrent
/// callers.
#[derive(Debug)]
pub struct AssignmentEngine<S> {
    store: S,
}

impl<S: ExperimentStore> AssignmentEngine<S> {
    /// Create an engine over the given store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create a draft experiment with its variants.
    ///
    /// Unset options default to 100% traffic, a 100-user minimum sample,
    /// a 0.05 minimum effect size, and an equal weight share
    /// (`100 / variant_count`) per variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExperiment`] - with no store write - when the
    /// draft has fewer than two variants, does not have exactly one control,
    /// carries a negative or non-finite weight, or has a traffic percentage
    /// outside 0-100. Store failures propagate as [`Error::Store`].
    pub async fn create_experiment(
        &self,
        created_by: Option<&str>,
        draft: ExperimentDraft,
    ) -> Result<Experiment> {
        if draft.variants.len() < 2 {
            return Err(Error::InvalidExperiment(
                "experiments must have at least 2 variants".to_string(),
            ));
        }
        let control_count = draft.variants.iter().filter(|v| v.is_control).count();
        if control_count != 1 {
            return Err(Error::InvalidExperiment(format!(
                "experiments must have exactly one control variant, got {control_count}"
            )));
        }
        if let Some(weight) = draft
            .variants
            .iter()
            .filter_map(|v| v.weight)
            .find(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(Error::InvalidExperiment(format!(
                "variant weights must be finite and non-negative, got {weight}"
            )));
        }
        let traffic = draft
            .traffic_percentage
            .unwrap_or(DEFAULT_TRAFFIC_PERCENTAGE);
        if !(0.0..=100.0).contains(&traffic) {
            return Err(Error::InvalidExperiment(format!(
                "traffic percentage must be within 0-100, got {traffic}"
            )));
        }

        #[allow(clippy::cast_precision_loss)]
        let default_weight = 100.0 / draft.variants.len() as f64;
        let variants: Vec<NewVariant> = draft
            .variants
            .into_iter()
            .map(|v| NewVariant {
                name: v.name,
                description: v.description,
                is_control: v.is_control,
                weight: v.weight.unwrap_or(default_weight),
                config: v.config,
            })
            .collect();

        let experiment = NewExperiment {
            name: draft.name,
            description: draft.description,
            hypothesis: draft.hypothesis,
            target_audience: draft.target_audience,
            traffic_percentage: traffic,
            primary_metric: draft.primary_metric,
            secondary_metrics: draft.secondary_metrics,
            minimum_sample_size: draft
                .minimum_sample_size
                .unwrap_or(DEFAULT_MINIMUM_SAMPLE_SIZE),
            minimum_effect_size: draft
                .minimum_effect_size
                .unwrap_or(DEFAULT_MINIMUM_EFFECT_SIZE),
            created_by: created_by.map(ToString::to_string),
        };

        let created = self.store.insert_experiment(experiment, variants).await?;
        debug!(experiment_id = created.id.as_str(), "experiment created");
        Ok(created)
    }

    /// Start a draft experiment. Conditional write: only a row still in
    /// `Draft` transitions, so racing starters cannot clobber each other.
    /// Returns whether the transition happened.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn start_experiment(&self, experiment_id: &str) -> Result<bool> {
        let update = ExperimentUpdate {
            status: Some(ExperimentStatus::Running),
            start_date: Some(Utc::now()),
            ..ExperimentUpdate::default()
        };
        self.store
            .transition_experiment(experiment_id, Some(ExperimentStatus::Draft), update)
            .await
    }

    /// Pause a running experiment. Existing assignments stay valid; no new
    /// users are enrolled while paused. Returns whether the transition
    /// happened.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn pause_experiment(&self, experiment_id: &str) -> Result<bool> {
        let update = ExperimentUpdate {
            status: Some(ExperimentStatus::Paused),
            ..ExperimentUpdate::default()
        };
        self.store
            .transition_experiment(experiment_id, Some(ExperimentStatus::Running), update)
            .await
    }

    /// Complete an experiment from any status, optionally recording a
    /// winner and conclusion notes. Stamps `concluded_at` and `end_date`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn complete_experiment(
        &self,
        experiment_id: &str,
        winner_variant_id: Option<&str>,
        conclusion_notes: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now();
        let update = ExperimentUpdate {
            status: Some(ExperimentStatus::Completed),
            end_date: Some(now),
            concluded_at: Some(now),
            winner_variant_id: winner_variant_id.map(ToString::to_string),
            conclusion_notes: conclusion_notes.map(ToString::to_string),
            ..ExperimentUpdate::default()
        };
        self.store
            .transition_experiment(experiment_id, None, update)
            .await
    }

    /// Archive a completed experiment, removing it from listings.
    /// Returns whether the transition happened.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn archive_experiment(&self, experiment_id: &str) -> Result<bool> {
        let update = ExperimentUpdate {
            status: Some(ExperimentStatus::Archived),
            ..ExperimentUpdate::default()
        };
        self.store
            .transition_experiment(experiment_id, Some(ExperimentStatus::Completed), update)
            .await
    }

    /// Get the user's variant, assigning one on first contact.
    ///
    /// A previously assigned user always gets the same variant back, with
    /// the exposure fields bumped - re-randomization never occurs. A new
    /// user is enrolled only when the experiment is running, the audience
    /// filter passes (unknown users are eligible), and a uniform roll in
    /// [0, 100) lands within `traffic_percentage`. An unsampled user
    /// leaves no row, so the traffic roll repeats on later calls until an
    /// assignment lands.
    ///
    /// `force_variant_id` selects that variant with reason `forced` when it
    /// names a variant of this experiment; otherwise selection is weighted
    /// random. Enrollment persists the assignment and appends one exposure
    /// event; if the event append fails the assignment is not rolled back
    /// and the error surfaces.
    ///
    /// Returns `Ok(None)` when the user is not (and will not be) enrolled
    /// by this call.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn variant_for_user(
        &self,
        experiment_id: &str,
        user_id: &str,
        force_variant_id: Option<&str>,
    ) -> Result<Option<ExperimentVariant>> {
        if let Some(existing) = self
            .store
            .assignment_for_user(experiment_id, user_id)
            .await?
        {
            self.store.record_exposure(experiment_id, user_id).await?;
            let variants = self.store.variants_for_experiment(experiment_id).await?;
            return Ok(variants.into_iter().find(|v| v.id == existing.variant_id));
        }

        let Some(experiment) = self.store.get_experiment(experiment_id).await? else {
            return Ok(None);
        };
        if experiment.status != ExperimentStatus::Running {
            debug!(experiment_id, user_id, "experiment not running, no assignment");
            return Ok(None);
        }

        if let Some(profile) = self.store.user_profile(user_id).await? {
            if !experiment.target_audience.matches(&profile) {
                debug!(experiment_id, user_id, "user not in target audience");
                return Ok(None);
            }
        }

        let roll = thread_rng().gen::<f64>() * 100.0;
        if roll > experiment.traffic_percentage {
            debug!(experiment_id, user_id, roll, "user outside traffic sample");
            return Ok(None);
        }

        let variants = self.store.variants_for_experiment(experiment_id).await?;
        if variants.is_empty() {
            warn!(experiment_id, "running experiment has no variants");
            return Ok(None);
        }

        let forced = force_variant_id.and_then(|id| variants.iter().find(|v| v.id == id));
        let (selected_id, reason) = match forced {
            Some(variant) => (variant.id.clone(), AssignmentReason::Forced),
            None => (
                select_by_weight(&variants, &mut thread_rng()).id.clone(),
                AssignmentReason::Random,
            ),
        };

        // First assignment wins: a racing call may have landed another
        // variant, in which case the stored row is what counts.
        let assignment = self
            .store
            .insert_assignment(NewAssignment {
                experiment_id: experiment_id.to_string(),
                variant_id: selected_id,
                user_id: user_id.to_string(),
                assignment_reason: reason,
            })
            .await?;

        if let Err(error) = self
            .store
            .insert_event(NewEvent {
                experiment_id: experiment_id.to_string(),
                variant_id: assignment.variant_id.clone(),
                user_id: user_id.to_string(),
                event_type: EventType::Exposure,
                event_name: None,
                event_value: None,
                event_metadata: serde_json::Map::new(),
            })
            .await
        {
            warn!(
                experiment_id,
                user_id, "exposure event append failed; assignment kept"
            );
            return Err(error);
        }

        Ok(variants.into_iter().find(|v| v.id == assignment.variant_id))
    }

    /// Append a behavioral event.
    ///
    /// The variant id is not cross-checked against the user's assignment;
    /// callers normally pass the id returned by
    /// [`variant_for_user`](Self::variant_for_user).
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn track_event(
        &self,
        experiment_id: &str,
        variant_id: &str,
        user_id: &str,
        event_type: EventType,
        options: EventOptions,
    ) -> Result<()> {
        self.store
            .insert_event(NewEvent {
                experiment_id: experiment_id.to_string(),
                variant_id: variant_id.to_string(),
                user_id: user_id.to_string(),
                event_type,
                event_name: options.event_name,
                event_value: options.event_value,
                event_metadata: options.event_metadata,
            })
            .await
    }

    /// Record a conversion, attributed to the user's assigned variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAssigned`] - and writes nothing - when the user
    /// has no assignment in this experiment. Store failures propagate.
    pub async fn track_conversion(
        &self,
        experiment_id: &str,
        user_id: &str,
        value: Option<f64>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let Some(assignment) = self
            .store
            .assignment_for_user(experiment_id, user_id)
            .await?
        else {
            return Err(Error::NotAssigned {
                experiment_id: experiment_id.to_string(),
                user_id: user_id.to_string(),
            });
        };

        self.track_event(
            experiment_id,
            &assignment.variant_id,
            user_id,
            EventType::Conversion,
            EventOptions {
                event_name: None,
                event_value: value,
                event_metadata: metadata,
            },
        )
        .await
    }

    /// List running experiments, most recently started first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn active_experiments(&self) -> Result<Vec<Experiment>> {
        self.store
            .experiments_with_status(ExperimentStatus::Running)
            .await
    }

    /// List a user's assignments in running experiments, joined with the
    /// experiment and variant rows.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn user_assignments(&self, user_id: &str) -> Result<Vec<UserExperiment>> {
        let assignments = self.store.assignments_for_user(user_id).await?;
        let mut rows = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let Some(experiment) = self.store.get_experiment(&assignment.experiment_id).await?
            else {
                continue;
            };
            if experiment.status != ExperimentStatus::Running {
                continue;
            }
            let variants = self
                .store
                .variants_for_experiment(&assignment.experiment_id)
                .await?;
            let Some(variant) = variants.into_iter().find(|v| v.id == assignment.variant_id)
            else {
                continue;
            };
            rows.push(UserExperiment {
                experiment,
                variant,
                assignment,
            });
        }
        Ok(rows)
    }
}

/// Weighted random selection over an experiment's variants.
///
/// Each variant owns an interval proportional to its share of the summed
/// weights; a uniform draw over the total picks the variant whose boundary
/// it crosses. A non-positive weight total falls back to the first variant.
///
/// # Panics
///
/// Panics if `variants` is empty.
#[must_use]
pub fn select_by_weight<'a, R: Rng + ?Sized>(
    variants: &'a [ExperimentVariant],
    rng: &mut R,
) -> &'a ExperimentVariant {
    assert!(!variants.is_empty(), "cannot select from zero variants");

    let total: f64 = variants.iter().map(|v| v.weight).sum();
    if total <= 0.0 {
        return &variants[0];
    }

    let mut roll = rng.gen::<f64>() * total;
    for variant in variants {
        roll -= variant.weight;
        if roll <= 0.0 {
            return variant;
        }
    }
    // Unreachable in exact arithmetic; covers accumulated rounding
    &variants[variants.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::VariantConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn variant(id: &str, weight: f64) -> ExperimentVariant {
        ExperimentVariant {
            id: id.to_string(),
            experiment_id: "e-1".to_string(),
            name: id.to_string(),
            description: None,
            is_control: false,
            weight,
            config: VariantConfig::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_by_weight_zero_total_falls_back_to_first() {
        let variants = vec![variant("a", 0.0), variant("b", 0.0)];
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(select_by_weight(&variants, &mut rng).id, "a");
    }

    #[test]
    fn test_select_by_weight_single_nonzero() {
        let variants = vec![variant("a", 0.0), variant("b", 5.0)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(select_by_weight(&variants, &mut rng).id, "b");
        }
    }

    #[test]
    fn test_select_by_weight_fairness() {
        // 10/90 split converges to ~90% for the heavy variant
        let variants = vec![variant("light", 10.0), variant("heavy", 90.0)];
        let mut rng = StdRng::seed_from_u64(42);

        let draws = 100_000;
        let heavy = (0..draws)
            .filter(|_| select_by_weight(&variants, &mut rng).id == "heavy")
            .count();

        #[allow(clippy::cast_precision_loss)]
        let share = heavy as f64 / f64::from(draws);
        assert!(
            (share - 0.9).abs() < 0.02,
            "heavy variant share {share} not near 0.9"
        );
    }

    #[test]
    fn test_select_by_weight_unnormalized_weights() {
        // Weights need not sum to 100
        let variants = vec![variant("a", 1.0), variant("b", 3.0)];
        let mut rng = StdRng::seed_from_u64(11);

        let draws = 100_000;
        let b_count = (0..draws)
            .filter(|_| select_by_weight(&variants, &mut rng).id == "b")
            .count();

        #[allow(clippy::cast_precision_loss)]
        let share = b_count as f64 / f64::from(draws);
        assert!((share - 0.75).abs() < 0.02, "share {share} not near 0.75");
    }
}
