//! Integration tests for the query surface over the shared stores.

use knockflow::patterns::{KnockPattern, PatternStore};
use knockflow::service::{CompareRequest, KnockService, KnockSubmission, LatestKnock};
use knockflow::settings::{SensorConfig, SensorConfigPatch, SettingsStore};
use knockflow::store::KnockStore;
use std::sync::Arc;
use tempfile::tempdir;

fn make_service(patterns_path: &std::path::Path) -> KnockService {
    KnockService::new(
        Arc::new(KnockStore::new()),
        Arc::new(SettingsStore::new(SensorConfig::default())),
        Arc::new(PatternStore::load(patterns_path).unwrap()),
    )
}

#[tokio::test]
async fn test_seeded_patterns_listed_in_order() {
    // Test: a fresh store seeds the two defaults and lists them in order
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    let listed = service.patterns().await.patterns;
    assert_eq!(
        listed,
        vec![
            KnockPattern { id: 1, pattern: vec![50, 30, 450] },
            KnockPattern { id: 2, pattern: vec![60, 40, 500] },
        ]
    );
}

#[tokio::test]
async fn test_duplicate_pattern_is_success_shaped() {
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    let response = service
        .add_pattern(KnockPattern { id: 1, pattern: vec![1, 2, 3] })
        .await
        .unwrap();
    assert_eq!(response.message, "Pattern ID already exists");
    assert_eq!(response.pattern, None);

    // Store is untouched
    assert_eq!(service.patterns().await.patterns.len(), 2);
}

#[tokio::test]
async fn test_add_pattern_acknowledges_stored_pattern() {
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    let added = KnockPattern { id: 9, pattern: vec![80, 90] };
    let response = service.add_pattern(added.clone()).await.unwrap();
    assert_eq!(response.message, "Pattern added");
    assert_eq!(response.pattern, Some(added));
    assert_eq!(service.patterns().await.patterns.len(), 3);
}

#[tokio::test]
async fn test_submission_ack_carries_config_and_updates_latest() {
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    // No submission yet
    assert!(matches!(service.latest_knock().await, LatestKnock::Empty { .. }));

    let ack = service
        .submit_knock(KnockSubmission {
            timeout: 1200,
            knock_sequence: vec![50, 30, 450],
        })
        .await;
    assert_eq!(ack.message, "Knock data received");
    assert_eq!(ack.config, SensorConfig::default());

    match service.latest_knock().await {
        LatestKnock::Sequence { knock_sequence } => {
            assert_eq!(knock_sequence, vec![50, 30, 450]);
        }
        LatestKnock::Empty { .. } => panic!("expected a stored submission"),
    }
}

#[tokio::test]
async fn test_config_roundtrip_and_rejection() {
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    let updated = service
        .update_config(SensorConfigPatch {
            knock_threshold: Some(300),
            is_programming_mode: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.message, "Configuration updated");
    assert_eq!(updated.config.knock_threshold, 300);
    assert!(updated.config.is_programming_mode);

    // An invalid field rejects the whole patch
    let result = service
        .update_config(SensorConfigPatch {
            knock_threshold: Some(-1),
            knock_fade_time: Some(500),
            ..Default::default()
        })
        .await;
    assert!(result.is_err());

    let config = service.config().await;
    assert_eq!(config.knock_threshold, 300);
    assert_eq!(config.knock_fade_time, 150);
}

#[tokio::test]
async fn test_compare_through_the_service() {
    let dir = tempdir().unwrap();
    let service = make_service(&dir.path().join("patterns.json"));

    let result = service.compare(CompareRequest {
        knock1: vec![50, 30],
        knock2: vec![50, 30],
        deviation: 0.0,
    });
    assert!(result.is_match);

    let result = service.compare(CompareRequest {
        knock1: vec![1, 2, 3],
        knock2: vec![1, 2],
        deviation: 25.0,
    });
    assert!(!result.is_match);
    assert_eq!(result.reason.as_deref(), Some("length mismatch"));
}
