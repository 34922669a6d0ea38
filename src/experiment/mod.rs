//! Experiment domain records
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< ExperimentVariant (N)
//!       │
//!       ├──< ExperimentAssignment (N)   [one per (experiment, user)]
//!       └──< ExperimentEvent (N)        [append-only]
//! ```
//!
//! Records serialize with the snake_case column names of the backing tables
//! (`experiments`, `experiment_variants`, `experiment_assignments`,
//! `experiment_events`), so a store implementation can pass them through a
//! JSON/REST row API unchanged.

mod assignment;
mod definition;
mod event;
mod metrics;
mod profile;
mod variant;

pub use assignment::{AssignmentReason, ExperimentAssignment, NewAssignment};
pub use definition::{
    Experiment, ExperimentDraft, ExperimentDraftBuilder, ExperimentStatus, ExperimentUpdate,
    NewExperiment, TargetAudience,
};
pub use event::{EventOptions, EventType, ExperimentEvent, NewEvent};
pub use metrics::{ExperimentMetrics, ExperimentResults, UserExperiment};
pub use profile::UserProfile;
pub use variant::{ExperimentVariant, NewVariant, VariantConfig, VariantDraft};
