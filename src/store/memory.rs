//! In-memory store implementation using `DashMap`.
//!
//! This is the test double and embedded backend - data is lost on process
//! restart. Remote deployments implement [`ExperimentStore`] over their own
//! client instead.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::ExperimentStore;
use crate::experiment::{
    EventType, Experiment, ExperimentAssignment, ExperimentEvent, ExperimentStatus,
    ExperimentUpdate, ExperimentVariant, NewAssignment, NewEvent, NewExperiment, NewVariant,
    UserProfile,
};
use crate::Result;

/// In-memory experiment store backed by concurrent hashmaps.
///
/// Row ids are v4 UUIDs. The experiment-plus-variants insert is atomic in
/// the trivial sense that nothing can fail between the two map writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    experiments: DashMap<String, Experiment>,
    variants: DashMap<String, ExperimentVariant>,
    assignments: DashMap<(String, String), ExperimentAssignment>,
    events: DashMap<String, ExperimentEvent>,
    profiles: DashMap<String, UserProfile>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of experiment rows.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of assignment rows.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Number of event rows.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Register a user profile for audience filtering.
    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

impl ExperimentStore for MemoryStore {
    async fn insert_experiment(
        &self,
        experiment: NewExperiment,
        variants: Vec<NewVariant>,
    ) -> Result<Experiment> {
        let now = Utc::now();
        let experiment_id = Self::new_id();

        let row = Experiment {
            id: experiment_id.clone(),
            name: experiment.name,
            description: experiment.description,
            hypothesis: experiment.hypothesis,
            status: ExperimentStatus::Draft,
            target_audience: experiment.target_audience,
            traffic_percentage: experiment.traffic_percentage,
            start_date: None,
            end_date: None,
            primary_metric: experiment.primary_metric,
            secondary_metrics: experiment.secondary_metrics,
            minimum_sample_size: experiment.minimum_sample_size,
            minimum_effect_size: experiment.minimum_effect_size,
            winner_variant_id: None,
            concluded_at: None,
            conclusion_notes: None,
            created_by: experiment.created_by,
            created_at: now,
            updated_at: now,
        };

        for variant in variants {
            let variant_id = Self::new_id();
            self.variants.insert(
                variant_id.clone(),
                ExperimentVariant {
                    id: variant_id,
                    experiment_id: experiment_id.clone(),
                    name: variant.name,
                    description: variant.description,
                    is_control: variant.is_control,
                    weight: variant.weight,
                    config: variant.config,
                    created_at: now,
                },
            );
        }
        self.experiments.insert(experiment_id, row.clone());

        Ok(row)
    }

    async fn get_experiment(&self, id: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.get(id).map(|e| e.value().clone()))
    }

    async fn experiments_with_status(
        &self,
        status: ExperimentStatus,
    ) -> Result<Vec<Experiment>> {
        let mut rows: Vec<Experiment> = self
            .experiments
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.value().clone())
            .collect();

        // Most recently started first; never-started rows last
        rows.sort_by(|a, b| b.start_date.cmp(&a.start_date));

        Ok(rows)
    }

    async fn transition_experiment(
        &self,
        id: &str,
        expected: Option<ExperimentStatus>,
        update: ExperimentUpdate,
    ) -> Result<bool> {
        let Some(mut row) = self.experiments.get_mut(id) else {
            return Ok(false);
        };
        if let Some(expected) = expected {
            if row.status != expected {
                return Ok(false);
            }
        }

        if let Some(status) = update.status {
            row.status = status;
        }
        if update.start_date.is_some() {
            row.start_date = update.start_date;
        }
        if update.end_date.is_some() {
            row.end_date = update.end_date;
        }
        if update.winner_variant_id.is_some() {
            row.winner_variant_id = update.winner_variant_id;
        }
        if update.conclusion_notes.is_some() {
            row.conclusion_notes = update.conclusion_notes;
        }
        if update.concluded_at.is_some() {
            row.concluded_at = update.concluded_at;
        }
        row.updated_at = Utc::now();

        Ok(true)
    }

    async fn variants_for_experiment(
        &self,
        experiment_id: &str,
    ) -> Result<Vec<ExperimentVariant>> {
        let mut rows: Vec<ExperimentVariant> = self
            .variants
            .iter()
            .filter(|v| v.experiment_id == experiment_id)
            .map(|v| v.value().clone())
            .collect();

        // Stable order for deterministic weighted selection
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(rows)
    }

    async fn assignment_for_user(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> Result<Option<ExperimentAssignment>> {
        let key = (experiment_id.to_string(), user_id.to_string());
        Ok(self.assignments.get(&key).map(|a| a.value().clone()))
    }

    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<ExperimentAssignment> {
        let key = (
            assignment.experiment_id.clone(),
            assignment.user_id.clone(),
        );
        let now = Utc::now();

        // First assignment wins; a concurrent duplicate insert returns the
        // row that landed first.
        let row = self
            .assignments
            .entry(key)
            .or_insert_with(|| ExperimentAssignment {
                id: Self::new_id(),
                experiment_id: assignment.experiment_id,
                variant_id: assignment.variant_id,
                user_id: assignment.user_id,
                assigned_at: now,
                assignment_reason: assignment.assignment_reason,
                first_exposure_at: Some(now),
                last_exposure_at: Some(now),
                exposure_count: 1,
            })
            .clone();

        Ok(row)
    }

    async fn record_exposure(&self, experiment_id: &str, user_id: &str) -> Result<()> {
        let key = (experiment_id.to_string(), user_id.to_string());
        if let Some(mut row) = self.assignments.get_mut(&key) {
            let now = Utc::now();
            row.exposure_count += 1;
            row.last_exposure_at = Some(now);
            if row.first_exposure_at.is_none() {
                row.first_exposure_at = Some(now);
            }
        }
        Ok(())
    }

    async fn assignments_for_variant(
        &self,
        experiment_id: &str,
        variant_id: &str,
    ) -> Result<Vec<ExperimentAssignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.experiment_id == experiment_id && a.variant_id == variant_id)
            .map(|a| a.value().clone())
            .collect())
    }

    async fn assignments_for_user(&self, user_id: &str) -> Result<Vec<ExperimentAssignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.value().clone())
            .collect())
    }

    async fn insert_event(&self, event: NewEvent) -> Result<()> {
        let id = Self::new_id();
        self.events.insert(
            id.clone(),
            ExperimentEvent {
                id,
                experiment_id: event.experiment_id,
                variant_id: event.variant_id,
                user_id: event.user_id,
                event_type: event.event_type,
                event_name: event.event_name,
                event_value: event.event_value,
                event_metadata: event.event_metadata,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn events_of_type(
        &self,
        experiment_id: &str,
        variant_id: &str,
        event_type: EventType,
    ) -> Result<Vec<ExperimentEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| {
                e.experiment_id == experiment_id
                    && e.variant_id == variant_id
                    && e.event_type == event_type
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|p| p.value().clone()))
    }
}
