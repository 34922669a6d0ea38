//! Analysis engine integration tests over `MemoryStore`
//!
//! Data is seeded straight through the store so group sizes and conversion
//! counts are exact, then checked against the engine's derived metrics.

use splitrun::engine::{AnalysisEngine, AssignmentEngine};
use splitrun::experiment::{
    AssignmentReason, EventType, Experiment, ExperimentDraft, NewAssignment, NewEvent,
    VariantDraft,
};
use splitrun::store::{ExperimentStore, MemoryStore};

/// Surface engine `debug!`/`warn!` output when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn experiment_with_variants(
    store: &MemoryStore,
    minimum_sample_size: u64,
) -> (Experiment, String, String) {
    let engine = AssignmentEngine::new(store);
    let draft = ExperimentDraft::builder("exp", "conversion")
        .minimum_sample_size(minimum_sample_size)
        .variant(VariantDraft::control("control"))
        .variant(VariantDraft::treatment("treatment"))
        .build();
    let experiment = engine.create_experiment(None, draft).await.unwrap();
    engine.start_experiment(&experiment.id).await.unwrap();

    let variants = store.variants_for_experiment(&experiment.id).await.unwrap();
    let control_id = variants.iter().find(|v| v.is_control).unwrap().id.clone();
    let treatment_id = variants.iter().find(|v| !v.is_control).unwrap().id.clone();
    (experiment, control_id, treatment_id)
}

/// Assign `users` fresh users to a variant and convert the first
/// `conversions` of them.
async fn seed_group(
    store: &MemoryStore,
    experiment_id: &str,
    variant_id: &str,
    users: u64,
    conversions: u64,
) {
    for i in 0..users {
        let user_id = format!("u-{variant_id}-{i}");
        store
            .insert_assignment(NewAssignment {
                experiment_id: experiment_id.to_string(),
                variant_id: variant_id.to_string(),
                user_id: user_id.clone(),
                assignment_reason: AssignmentReason::Random,
            })
            .await
            .unwrap();
        if i < conversions {
            store
                .insert_event(NewEvent {
                    experiment_id: experiment_id.to_string(),
                    variant_id: variant_id.to_string(),
                    user_id,
                    event_type: EventType::Conversion,
                    event_name: None,
                    event_value: None,
                    event_metadata: serde_json::Map::new(),
                })
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn test_unknown_experiment_has_no_results() {
    init_tracing();
    let engine = AnalysisEngine::new(MemoryStore::new());
    assert!(engine.experiment_results("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_winner_is_significant() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 100).await;

    // Control: 10% of 1000. Treatment: 20% of 1000.
    seed_group(&store, &experiment.id, &control_id, 1000, 100).await;
    seed_group(&store, &experiment.id, &treatment_id, 1000, 200).await;

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    let control = results.metrics.iter().find(|m| m.is_control).unwrap();
    let treatment = results.metrics.iter().find(|m| !m.is_control).unwrap();

    assert_eq!(control.total_users, 1000);
    assert_eq!(control.exposed_users, 1000);
    assert_eq!(control.converted_users, 100);
    assert!((control.conversion_rate - 0.1).abs() < 1e-9);
    assert!((control.exposure_rate - 1.0).abs() < 1e-9);
    // Control is never compared against itself
    assert!(control.lift_vs_control.is_none());
    assert!(control.p_value.is_none());

    assert!((treatment.conversion_rate - 0.2).abs() < 1e-9);
    assert!((treatment.lift_vs_control.unwrap() - 100.0).abs() < 1e-9);
    assert!(treatment.is_significant);
    assert!(treatment.p_value.unwrap() < 0.05);
    assert!(treatment.confidence_interval_lower.unwrap() > 0.0);
    assert!(treatment.confidence_interval_upper.unwrap() > 0.0);

    assert!(
        results.recommendation.starts_with("Winner: \"treatment\""),
        "got: {}",
        results.recommendation
    );
    assert!(results.confidence > 95.0);
}

#[tokio::test]
async fn test_small_sample_guard() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 10).await;

    // 29 exposed users per group is below the floor, whatever the gap
    seed_group(&store, &experiment.id, &control_id, 29, 2).await;
    seed_group(&store, &experiment.id, &treatment_id, 29, 20).await;

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    let treatment = results.metrics.iter().find(|m| !m.is_control).unwrap();
    assert!(treatment.lift_vs_control.is_some());
    assert!(treatment.p_value.is_none());
    assert!(!treatment.is_significant);
    assert_eq!(results.confidence, 0.0);
}

#[tokio::test]
async fn test_thirty_exposed_per_group_runs_significance_test() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 10).await;

    // Exactly 30 exposed users per group sits on the floor, not below it
    seed_group(&store, &experiment.id, &control_id, 30, 3).await;
    seed_group(&store, &experiment.id, &treatment_id, 30, 20).await;

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    let treatment = results.metrics.iter().find(|m| !m.is_control).unwrap();
    assert!(treatment.p_value.is_some(), "floor is inclusive at 30");
    assert!(treatment.confidence_interval_lower.is_some());
    assert!(treatment.confidence_interval_upper.is_some());
}

#[tokio::test]
async fn test_distinct_user_conversion_counting() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 1).await;
    seed_group(&store, &experiment.id, &control_id, 5, 1).await;
    seed_group(&store, &experiment.id, &treatment_id, 5, 0).await;

    // The same treatment user converts three times
    for _ in 0..3 {
        store
            .insert_event(NewEvent {
                experiment_id: experiment.id.clone(),
                variant_id: treatment_id.clone(),
                user_id: "repeat-converter".to_string(),
                event_type: EventType::Conversion,
                event_name: None,
                event_value: None,
                event_metadata: serde_json::Map::new(),
            })
            .await
            .unwrap();
    }

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    let treatment = results
        .metrics
        .iter()
        .find(|m| m.variant_id == treatment_id)
        .unwrap();
    assert_eq!(treatment.converted_users, 1, "three events, one user");
}

#[tokio::test]
async fn test_insufficient_sample_recommendation_is_verbatim() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 1000).await;

    // Huge observed lift, tiny sample: the message must not change
    seed_group(&store, &experiment.id, &control_id, 5, 0).await;
    seed_group(&store, &experiment.id, &treatment_id, 5, 5).await;

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        results.recommendation,
        "Insufficient sample size. Need 1000 samples, currently have 10. \
         Continue running the experiment."
    );
}

#[tokio::test]
async fn test_conversion_value_statistics() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 1).await;
    seed_group(&store, &experiment.id, &control_id, 10, 1).await;
    seed_group(&store, &experiment.id, &treatment_id, 10, 0).await;

    for (user, value) in [("u-a", 10.0), ("u-b", 20.0), ("u-c", 30.0)] {
        store
            .insert_event(NewEvent {
                experiment_id: experiment.id.clone(),
                variant_id: treatment_id.clone(),
                user_id: user.to_string(),
                event_type: EventType::Conversion,
                event_name: None,
                event_value: Some(value),
                event_metadata: serde_json::Map::new(),
            })
            .await
            .unwrap();
    }
    // A conversion without a value is ignored by the value statistics
    store
        .insert_event(NewEvent {
            experiment_id: experiment.id.clone(),
            variant_id: treatment_id.clone(),
            user_id: "u-d".to_string(),
            event_type: EventType::Conversion,
            event_name: None,
            event_value: None,
            event_metadata: serde_json::Map::new(),
        })
        .await
        .unwrap();

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    let treatment = results
        .metrics
        .iter()
        .find(|m| m.variant_id == treatment_id)
        .unwrap();
    assert!((treatment.metric_mean.unwrap() - 20.0).abs() < 1e-9);
    assert!((treatment.metric_median.unwrap() - 20.0).abs() < 1e-9);
    assert!((treatment.metric_std_dev.unwrap() - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_zero_conversion_control_skips_comparison() {
    init_tracing();
    let store = MemoryStore::new();
    let (experiment, control_id, treatment_id) = experiment_with_variants(&store, 10).await;
    seed_group(&store, &experiment.id, &control_id, 100, 0).await;
    seed_group(&store, &experiment.id, &treatment_id, 100, 50).await;

    let engine = AnalysisEngine::new(&store);
    let results = engine
        .experiment_results(&experiment.id)
        .await
        .unwrap()
        .unwrap();

    // Lift against a zero-rate control is undefined, so no comparison runs
    let treatment = results.metrics.iter().find(|m| !m.is_control).unwrap();
    assert!(treatment.lift_vs_control.is_none());
    assert!(treatment.p_value.is_none());
    assert!(!treatment.is_significant);
}
