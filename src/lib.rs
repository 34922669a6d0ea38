//! # Splitrun: Storage-Backed A/B Experiment Engine
//!
//! Splitrun assigns users to experiment variants (weighted random or
//! forced), keeps assignments sticky for the lifetime of the experiment,
//! tracks exposure and conversion events, and analyzes the results with a
//! pooled two-proportion z-test and a plain-language recommendation.
//!
//! All state lives behind the [`store::ExperimentStore`] trait - four
//! logical tables reached through request/response calls. Production code
//! injects a remote client; tests and embedded use get
//! [`store::MemoryStore`].
//!
//! ## Example
//!
//! ```rust
//! use splitrun::engine::AssignmentEngine;
//! use splitrun::experiment::{ExperimentDraft, VariantDraft};
//! use splitrun::store::MemoryStore;
//!
//! # async fn example() -> splitrun::Result<()> {
//! let engine = AssignmentEngine::new(MemoryStore::new());
//!
//! let draft = ExperimentDraft::builder("Checkout flow", "purchase_completed")
//!     .hypothesis("One-page checkout converts better")
//!     .variant(VariantDraft::control("two-page"))
//!     .variant(VariantDraft::treatment("one-page"))
//!     .build();
//! let experiment = engine.create_experiment(Some("admin-1"), draft).await?;
//! engine.start_experiment(&experiment.id).await?;
//!
//! // Sticky assignment: the same user always gets the same variant
//! let variant = engine.variant_for_user(&experiment.id, "user-1", None).await?;
//! if variant.is_some() {
//!     engine
//!         .track_conversion(&experiment.id, "user-1", Some(49.0), Default::default())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod engine;
pub mod error;
pub mod experiment;
pub mod stats;
pub mod store;

pub use engine::{AnalysisEngine, AssignmentEngine};
pub use error::{Error, Result};
