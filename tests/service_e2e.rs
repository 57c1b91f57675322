//! End-to-end tests through the public service API.

mod common;

use std::sync::Arc;

use affinity::checkpoint::Checkpoint;
use affinity::feedback::FeedbackEvent;
use affinity::service::{LoadOutcome, RecommendationService, TrainingOutcome};
use affinity::synthetic::{generate_feedback, placeholder_ids};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use common::{checkpoint_path, cpu_service, polarized_events, small_config};

#[test]
fn test_train_then_restart_restores_identical_scores() {
    let dir = TempDir::new().expect("temp dir");
    let candidates = ["a", "b", "x", "y"];

    let first = cpu_service(small_config(&dir));
    let outcome = first
        .train_model(&polarized_events(), 20)
        .expect("training should succeed");
    match outcome {
        TrainingOutcome::Trained {
            num_seekers,
            num_candidates,
            examples,
            checkpoint_bytes,
            ..
        } => {
            assert_eq!(num_seekers, 2);
            assert_eq!(num_candidates, 4);
            assert_eq!(examples, 24);
            assert!(checkpoint_bytes > 0);
        }
        other => panic!("expected Trained, got {:?}", other),
    }
    let before = first.recommend("alice", &candidates, 4);
    drop(first);

    let restarted = cpu_service(small_config(&dir));
    assert!(restarted.is_trained());
    assert_eq!(restarted.num_seekers(), Some(2));
    assert_eq!(restarted.num_candidates(), Some(4));
    assert!(restarted.knows_seeker("bob"));
    assert!(!restarted.knows_seeker("carol"));

    let after = restarted.recommend("alice", &candidates, 4);
    assert_eq!(before, after);
}

#[test]
fn test_scores_are_probabilities_and_sorted() {
    let dir = TempDir::new().expect("temp dir");
    let service = cpu_service(small_config(&dir));
    service
        .train_model(&polarized_events(), 10)
        .expect("training should succeed");

    let ranked = service.recommend("bob", &["a", "b", "x", "y"], 10);

    assert_eq!(ranked.len(), 4);
    assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_unknown_ids_fall_back_to_neutral() {
    let dir = TempDir::new().expect("temp dir");
    let service = cpu_service(small_config(&dir));
    service
        .train_model(&polarized_events(), 5)
        .expect("training should succeed");

    let unknown_seeker = service.recommend("mallory", &["a", "x"], 5);
    assert!(unknown_seeker.iter().all(|r| r.score == 0.5));
    assert_eq!(unknown_seeker[0].candidate_id, "a");

    let mixed = service.recommend("alice", &["new", "a", "x"], 5);
    assert_eq!(mixed.len(), 3);
    assert_eq!(mixed[2].candidate_id, "new");
    assert_eq!(mixed[2].score, 0.5);
}

#[test]
fn test_corrupt_checkpoint_starts_untrained() {
    let dir = TempDir::new().expect("temp dir");
    let path = checkpoint_path(&dir);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    std::fs::write(&path, b"definitely not a checkpoint").expect("write garbage");

    let service = cpu_service(small_config(&dir));

    assert!(!service.is_trained());
    assert!(matches!(service.load_model(), LoadOutcome::Failed { .. }));
    assert_eq!(
        service.recommend("alice", &["a", "b"], 1)[0].candidate_id,
        "a"
    );
}

#[test]
fn test_oversized_checkpoint_starts_untrained() {
    let dir = TempDir::new().expect("temp dir");
    let checkpoint = Checkpoint {
        version: affinity::constants::CHECKPOINT_VERSION,
        num_seekers: 1,
        num_candidates: 1,
        embedding_dim: 1 << 62,
        hidden_dims: Vec::new(),
        dropout: 0.0,
        seeker_ids: vec!["alice".to_string()],
        candidate_ids: vec!["a".to_string()],
        tensors: Vec::new(),
    };
    checkpoint
        .write(&checkpoint_path(&dir))
        .expect("write crafted checkpoint");

    let service = cpu_service(small_config(&dir));

    assert!(!service.is_trained());
    assert!(matches!(service.load_model(), LoadOutcome::Failed { .. }));
    assert_eq!(service.recommend("alice", &["a"], 1)[0].score, 0.5);
}

#[test]
fn test_checkpoint_file_carries_vocabulary() {
    let dir = TempDir::new().expect("temp dir");
    let service = cpu_service(small_config(&dir));
    service
        .train_model(&polarized_events(), 3)
        .expect("training should succeed");

    let checkpoint = Checkpoint::read(&checkpoint_path(&dir)).expect("checkpoint readable");

    assert_eq!(checkpoint.seeker_ids, vec!["alice", "bob"]);
    assert_eq!(checkpoint.candidate_ids, vec!["a", "b", "x", "y"]);
    assert_eq!(checkpoint.embedding_dim, 8);
    assert_eq!(checkpoint.hidden_dims, vec![16, 8]);
}

#[test]
fn test_feedback_json_accepts_legacy_field_names() {
    let json = r#"[
        {"swiper_id": "alice", "swiped_id": "a", "direction": "right"},
        {"seeker_id": "bob", "candidate_id": "a", "direction": "left"}
    ]"#;

    let events: Vec<FeedbackEvent> = serde_json::from_str(json).expect("valid feedback json");

    assert_eq!(events[0], FeedbackEvent::approve("alice", "a"));
    assert_eq!(events[1], FeedbackEvent::reject("bob", "a"));
}

#[test]
fn test_synthetic_feedback_trains_a_model() {
    let dir = TempDir::new().expect("temp dir");
    let service = cpu_service(small_config(&dir));
    let seekers = placeholder_ids("seeker", 10);
    let candidates = placeholder_ids("candidate", 10);
    let mut rng = StdRng::seed_from_u64(3);

    let events = generate_feedback(&seekers, &candidates, &mut rng);
    let outcome = service.train_model(&events, 2).expect("training");

    assert!(outcome.is_trained());
    assert_eq!(service.num_seekers(), Some(10));
}

#[tokio::test]
async fn test_training_on_blocking_task_while_serving() {
    let dir = TempDir::new().expect("temp dir");
    let service = Arc::new(cpu_service(small_config(&dir)));

    let trainer = Arc::clone(&service);
    let training = tokio::task::spawn_blocking(move || {
        trainer.train_model(&polarized_events(), 10)
    });

    for _ in 0..20 {
        let ranked = service.recommend("alice", &["a", "b", "x", "y"], 2);
        assert_eq!(ranked.len(), 2);
        tokio::task::yield_now().await;
    }

    let outcome = training
        .await
        .expect("task joined")
        .expect("training should succeed");
    assert!(outcome.is_trained());
    assert!(service.is_trained());
}

#[test]
fn test_service_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecommendationService>();
}
