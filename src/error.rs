//! Error types for splitrun
//!
//! Absence is not an error: lookups return `Ok(None)` when a record does not
//! exist, and `Err` is reserved for validation and store failures. Callers
//! can therefore tell "no variant for this user" apart from "the store call
//! failed" without inspecting logs.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Splitrun error types
#[derive(Error, Debug)]
pub enum Error {
    /// Experiment definition rejected before any store write
    #[error("invalid experiment: {0}")]
    InvalidExperiment(String),

    /// Conversion tracked for a user that was never assigned a variant
    #[error("no assignment for user {user_id} in experiment {experiment_id}")]
    NotAssigned {
        /// Experiment the conversion was attributed to
        experiment_id: String,
        /// User with no assignment row
        user_id: String,
    },

    /// Backing store failure (network, query, constraint)
    #[error("store error: {0}")]
    Store(String),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
