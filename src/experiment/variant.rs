//! Experiment variant - one arm of an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Behavior switch a variant carries for downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Feature flag the UI consults to alter behavior.
    pub feature_flag: Option<String>,
    /// Free-form parameters for the flagged behavior.
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// A stored variant row. Variants are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentVariant {
    /// Row id.
    pub id: String,
    /// Parent experiment id.
    pub experiment_id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether this variant is the control arm.
    pub is_control: bool,
    /// Relative selection weight. Weights need not sum to 100;
    /// selection normalizes by the total.
    pub weight: f64,
    /// Behavior switch carried to downstream consumers.
    pub config: VariantConfig,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Resolved variant fields handed to the store for insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariant {
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether this variant is the control arm.
    pub is_control: bool,
    /// Relative selection weight.
    pub weight: f64,
    /// Behavior switch carried to downstream consumers.
    pub config: VariantConfig,
}

/// Variant definition inside an experiment draft.
#[derive(Debug, Clone)]
pub struct VariantDraft {
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether this variant is the control arm.
    pub is_control: bool,
    /// Relative selection weight; defaults to an equal share
    /// (`100 / variant_count`) when unset.
    pub weight: Option<f64>,
    /// Behavior switch carried to downstream consumers.
    pub config: VariantConfig,
}

impl VariantDraft {
    /// Create a control variant definition.
    #[must_use]
    pub fn control(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_control: true,
            weight: None,
            config: VariantConfig::default(),
        }
    }

    /// Create a treatment variant definition.
    #[must_use]
    pub fn treatment(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_control: false,
            weight: None,
            config: VariantConfig::default(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the selection weight.
    #[must_use]
    pub const fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Set the variant config.
    #[must_use]
    pub fn config(mut self, config: VariantConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_and_treatment_drafts() {
        let control = VariantDraft::control("current");
        let treatment = VariantDraft::treatment("new-flow").weight(75.0);

        assert!(control.is_control);
        assert!(control.weight.is_none());
        assert!(!treatment.is_control);
        assert_eq!(treatment.weight, Some(75.0));
    }

    #[test]
    fn test_config_round_trip() {
        let mut params = serde_json::Map::new();
        params.insert("cta_color".to_string(), serde_json::json!("green"));
        let config = VariantConfig {
            feature_flag: Some("new_ui".to_string()),
            params,
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: VariantConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
