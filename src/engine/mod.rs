//! Assignment and analysis engines
//!
//! [`AssignmentEngine`] owns the write path: experiment lifecycle, sticky
//! variant assignment, and event tracking. [`AnalysisEngine`] owns the read
//! path: per-variant metrics, significance testing, and the recommendation.
//! Both are stateless wrappers around an injected [`ExperimentStore`].
//!
//! [`ExperimentStore`]: crate::store::ExperimentStore

mod analyze;
mod assign;

pub use analyze::AnalysisEngine;
pub use assign::{select_by_weight, AssignmentEngine};
