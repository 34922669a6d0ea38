//! Storage abstraction over the experiment tables
//!
//! All engine state lives behind [`ExperimentStore`]: four logical tables
//! (`experiments`, `experiment_variants`, `experiment_assignments`,
//! `experiment_events`) reached through request/response calls. The engines
//! take a store by value at construction, so production code can inject a
//! remote client and tests can inject [`MemoryStore`].
//!
//! The trait assumes no transactional guarantees beyond single-call
//! atomicity. The one multi-row write, [`ExperimentStore::insert_experiment`],
//! is a single call precisely so an implementation can make the
//! experiment-plus-variants insert atomic server-side.

mod memory;

pub use memory::MemoryStore;

use std::future::Future;

use crate::experiment::{
    EventType, Experiment, ExperimentAssignment, ExperimentEvent, ExperimentStatus,
    ExperimentUpdate, ExperimentVariant, NewAssignment, NewEvent, NewExperiment, NewVariant,
    UserProfile,
};
use crate::Result;

/// Backing store for experiments, variants, assignments, and events.
///
/// Lookups return `Ok(None)`/empty vectors for absent rows; `Err` is
/// reserved for store failures.
pub trait ExperimentStore: Send + Sync {
    /// Insert an experiment and its variants in one call.
    ///
    /// Implementations should perform both inserts atomically so a failure
    /// cannot leave an experiment row with no variants.
    fn insert_experiment(
        &self,
        experiment: NewExperiment,
        variants: Vec<NewVariant>,
    ) -> impl Future<Output = Result<Experiment>> + Send;

    /// Fetch an experiment by id.
    fn get_experiment(&self, id: &str) -> impl Future<Output = Result<Option<Experiment>>> + Send;

    /// List experiments with the given status, most recently started first.
    fn experiments_with_status(
        &self,
        status: ExperimentStatus,
    ) -> impl Future<Output = Result<Vec<Experiment>>> + Send;

    /// Apply `update` to an experiment, guarded by an expected status.
    ///
    /// With `expected = Some(s)` the write only happens while the row still
    /// has status `s` (a conditional `WHERE status = ...` write); with
    /// `None` it applies unconditionally. Returns whether a row changed.
    fn transition_experiment(
        &self,
        id: &str,
        expected: Option<ExperimentStatus>,
        update: ExperimentUpdate,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// List all variants of an experiment.
    fn variants_for_experiment(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentVariant>>> + Send;

    /// Fetch the assignment for a (experiment, user) pair.
    fn assignment_for_user(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<ExperimentAssignment>>> + Send;

    /// Insert a new assignment row.
    ///
    /// The store stamps `assigned_at`, sets both exposure timestamps to
    /// now, and starts `exposure_count` at 1.
    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> impl Future<Output = Result<ExperimentAssignment>> + Send;

    /// Record another exposure on an existing assignment: bump
    /// `exposure_count`, stamp `last_exposure_at`, and set
    /// `first_exposure_at` if still unset.
    fn record_exposure(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// List all assignments for one variant of an experiment.
    fn assignments_for_variant(
        &self,
        experiment_id: &str,
        variant_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentAssignment>>> + Send;

    /// List all assignments for a user across experiments.
    fn assignments_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentAssignment>>> + Send;

    /// Append an event row.
    fn insert_event(&self, event: NewEvent) -> impl Future<Output = Result<()>> + Send;

    /// List events of one type for a variant of an experiment.
    fn events_of_type(
        &self,
        experiment_id: &str,
        variant_id: &str,
        event_type: EventType,
    ) -> impl Future<Output = Result<Vec<ExperimentEvent>>> + Send;

    /// Fetch the profile used for audience filtering, if the store has one.
    ///
    /// The default implementation has no profile source; unknown users are
    /// treated as eligible by the assignment engine.
    fn user_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send {
        let _ = user_id;
        async { Ok(None) }
    }
}

// A shared reference to a store is itself a store, so an engine can borrow
// one that outlives it (tests seed data through the same store they hand
// to the engine).
impl<T: ExperimentStore> ExperimentStore for &T {
    fn insert_experiment(
        &self,
        experiment: NewExperiment,
        variants: Vec<NewVariant>,
    ) -> impl Future<Output = Result<Experiment>> + Send {
        (**self).insert_experiment(experiment, variants)
    }

    fn get_experiment(&self, id: &str) -> impl Future<Output = Result<Option<Experiment>>> + Send {
        (**self).get_experiment(id)
    }

    fn experiments_with_status(
        &self,
        status: ExperimentStatus,
    ) -> impl Future<Output = Result<Vec<Experiment>>> + Send {
        (**self).experiments_with_status(status)
    }

    fn transition_experiment(
        &self,
        id: &str,
        expected: Option<ExperimentStatus>,
        update: ExperimentUpdate,
    ) -> impl Future<Output = Result<bool>> + Send {
        (**self).transition_experiment(id, expected, update)
    }

    fn variants_for_experiment(
        &self,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentVariant>>> + Send {
        (**self).variants_for_experiment(experiment_id)
    }

    fn assignment_for_user(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<ExperimentAssignment>>> + Send {
        (**self).assignment_for_user(experiment_id, user_id)
    }

    fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> impl Future<Output = Result<ExperimentAssignment>> + Send {
        (**self).insert_assignment(assignment)
    }

    fn record_exposure(
        &self,
        experiment_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).record_exposure(experiment_id, user_id)
    }

    fn assignments_for_variant(
        &self,
        experiment_id: &str,
        variant_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentAssignment>>> + Send {
        (**self).assignments_for_variant(experiment_id, variant_id)
    }

    fn assignments_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ExperimentAssignment>>> + Send {
        (**self).assignments_for_user(user_id)
    }

    fn insert_event(&self, event: NewEvent) -> impl Future<Output = Result<()>> + Send {
        (**self).insert_event(event)
    }

    fn events_of_type(
        &self,
        experiment_id: &str,
        variant_id: &str,
        event_type: EventType,
    ) -> impl Future<Output = Result<Vec<ExperimentEvent>>> + Send {
        (**self).events_of_type(experiment_id, variant_id, event_type)
    }

    fn user_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>>> + Send {
        (**self).user_profile(user_id)
    }
}
