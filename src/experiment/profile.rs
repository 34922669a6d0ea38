//! User profile consulted by audience filters

use serde::{Deserialize, Serialize};

/// What the engine knows about a user for eligibility checks.
///
/// Profiles come from [`ExperimentStore::user_profile`]; a store that has
/// no profile source returns `None` and the user is treated as eligible.
///
/// [`ExperimentStore::user_profile`]: crate::store::ExperimentStore::user_profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub user_id: String,
    /// Platform roles (e.g. "student", "instructor").
    pub roles: Vec<String>,
    /// Course ids the user is enrolled in.
    pub courses: Vec<String>,
    /// Days the user has been active on the platform.
    pub active_days: u32,
}
