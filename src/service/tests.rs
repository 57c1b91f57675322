use super::*;
use crate::constants::ModelDims;
use crate::training::TrainerConfig;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> ServiceConfig {
    ServiceConfig::new(dir.path().join("models").join("preference.rkyv"))
        .with_dims(ModelDims::new(8, vec![16, 8]))
        .with_trainer(TrainerConfig::default().with_seed(11))
}

fn service(dir: &TempDir) -> RecommendationService {
    RecommendationService::with_device(test_config(dir), Device::Cpu)
}

/// 3 seekers x 4 candidates, 8 approvals and 4 rejections.
fn scenario_events() -> Vec<FeedbackEvent> {
    let grid = [
        ("s0", ["right", "right", "right", "left"]),
        ("s1", ["right", "left", "right", "right"]),
        ("s2", ["right", "left", "right", "left"]),
    ];
    let mut events = Vec::new();
    for (seeker, directions) in grid {
        for (c, direction) in directions.iter().enumerate() {
            events.push(FeedbackEvent::new(seeker, format!("c{}", c), *direction));
        }
    }
    events
}

fn candidates() -> Vec<String> {
    (0..4).map(|c| format!("c{}", c)).collect()
}

fn trained_service(dir: &TempDir) -> RecommendationService {
    let service = service(dir);
    let outcome = service
        .train_model(&scenario_events(), 5)
        .expect("training should succeed");
    assert!(outcome.is_trained());
    service
}

fn neutral(ids: &[&str]) -> Vec<Recommendation> {
    ids.iter().map(|id| Recommendation::new(*id, 0.5)).collect()
}

#[test]
fn test_untrained_returns_neutral_prefix() {
    let dir = TempDir::new().expect("temp dir");
    let service = service(&dir);

    assert!(!service.is_trained());
    assert_eq!(
        service.recommend("seeker", &["c1", "c2", "c3"], 2),
        neutral(&["c1", "c2"])
    );
}

#[test]
fn test_empty_candidate_list() {
    let dir = TempDir::new().expect("temp dir");
    let untrained = service(&dir);
    let empty: [&str; 0] = [];
    assert!(untrained.recommend("s0", &empty, 10).is_empty());

    let trained = trained_service(&dir);
    assert!(trained.recommend("s0", &empty, 10).is_empty());
}

#[test]
fn test_top_k_zero() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);
    assert!(service.recommend("s0", &candidates(), 0).is_empty());
}

#[test]
fn test_end_to_end_scenario() {
    let dir = TempDir::new().expect("temp dir");
    let service = service(&dir);

    let outcome = service
        .train_model(&scenario_events(), 5)
        .expect("training should succeed");

    match outcome {
        TrainingOutcome::Trained {
            num_seekers,
            num_candidates,
            examples,
            final_loss,
            checkpoint_bytes,
        } => {
            assert_eq!(num_seekers, 3);
            assert_eq!(num_candidates, 4);
            assert_eq!(examples, 12);
            assert!(final_loss.is_some_and(f32::is_finite));
            assert!(checkpoint_bytes > 0);
        }
        other => panic!("expected Trained, got {:?}", other),
    }

    assert_eq!(service.num_seekers(), Some(3));
    assert_eq!(service.num_candidates(), Some(4));
    assert!(service.checkpoint_path().exists());

    let ranked = service.recommend("s0", &candidates(), 4);

    assert_eq!(ranked.len(), 4);
    assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

    let mut returned: Vec<String> = ranked.iter().map(|r| r.candidate_id.clone()).collect();
    returned.sort();
    assert_eq!(returned, candidates());
}

#[test]
fn test_default_architecture_end_to_end() {
    let dir = TempDir::new().expect("temp dir");
    let service = RecommendationService::with_device(
        ServiceConfig::new(dir.path().join("model.rkyv")),
        Device::Cpu,
    );

    service
        .train_model(&scenario_events(), 5)
        .expect("training should succeed");

    assert_eq!(service.embedding_dim(), Some(32));
    let ranked = service.recommend("s1", &candidates(), 4);
    assert_eq!(ranked.len(), 4);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_insufficient_events_is_noop_when_untrained() {
    let dir = TempDir::new().expect("temp dir");
    let service = service(&dir);
    let events: Vec<FeedbackEvent> = scenario_events().into_iter().take(9).collect();

    let outcome = service.train_model(&events, 5).expect("no error");

    assert_eq!(
        outcome,
        TrainingOutcome::Skipped {
            reason: SkipReason::InsufficientEvents {
                found: 9,
                required: 10
            }
        }
    );
    assert!(!service.is_trained());
    assert!(!service.checkpoint_path().exists());
}

#[test]
fn test_insufficient_events_preserves_trained_model() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    let before = service.recommend("s2", &candidates(), 4);
    let checkpoint_before = std::fs::read(service.checkpoint_path()).expect("read");

    let few = vec![FeedbackEvent::approve("new", "other"); 3];
    let outcome = service.train_model(&few, 5).expect("no error");

    assert!(!outcome.is_trained());
    assert_eq!(service.recommend("s2", &candidates(), 4), before);
    assert_eq!(
        std::fs::read(service.checkpoint_path()).expect("read"),
        checkpoint_before
    );
}

#[test]
fn test_unknown_seeker_falls_back() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    assert_eq!(
        service.recommend("stranger", &["c3", "c0", "c1"], 2),
        neutral(&["c3", "c0"])
    );
}

#[test]
fn test_all_unknown_candidates_fall_back() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    assert_eq!(
        service.recommend("s0", &["x", "y", "z"], 10),
        neutral(&["x", "y", "z"])
    );
}

#[test]
fn test_unknown_candidates_appended_in_order() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    let ranked = service.recommend("s1", &["new1", "c2", "new2", "c0", "c3"], 10);

    assert_eq!(ranked.len(), 5);
    let known: Vec<&str> = ranked[..3].iter().map(|r| r.candidate_id.as_str()).collect();
    assert!(known.iter().all(|id| id.starts_with('c')));
    assert!(ranked[..3].windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(ranked[3], Recommendation::new("new1", 0.5));
    assert_eq!(ranked[4], Recommendation::new("new2", 0.5));
}

#[test]
fn test_truncation_cuts_unknown_tail_first() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    let ranked = service.recommend("s1", &["new1", "c2", "c0"], 2);

    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|r| r.candidate_id != "new1"));
}

#[test]
fn test_ties_keep_input_order() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    // Duplicate candidates score identically; the stable sort keeps their input order.
    let ranked = service.recommend("s0", &["c1", "c1", "c1"], 3);
    assert_eq!(ranked.len(), 3);
    assert!(ranked.windows(2).all(|w| w[0].score == w[1].score));
}

#[test]
fn test_save_and_restore_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let original = trained_service(&dir);
    original.save_model().expect("save").expect("trained model saved");

    let restored = service(&dir);
    assert!(restored.is_trained());

    let a = original.snapshot().expect("trained");
    let b = restored.snapshot().expect("restored");
    assert_eq!(a.model.num_seekers(), b.model.num_seekers());
    assert_eq!(a.model.num_candidates(), b.model.num_candidates());
    assert_eq!(a.model.embedding_dim(), b.model.embedding_dim());
    assert_eq!(a.index, b.index);

    let pairs: Vec<(u32, u32)> = (0..3).flat_map(|s| (0..4).map(move |c| (s, c))).collect();
    let expected = a.model.predict(&pairs).expect("predict");
    let actual = b.model.predict(&pairs).expect("predict");
    for (x, y) in actual.iter().zip(&expected) {
        assert!((x - y).abs() < 1e-5);
    }

    assert_eq!(
        original.recommend("s0", &candidates(), 4),
        restored.recommend("s0", &candidates(), 4)
    );
}

#[test]
fn test_save_untrained_is_noop() {
    let dir = TempDir::new().expect("temp dir");
    let service = service(&dir);

    assert_eq!(service.save_model().expect("no error"), None);
    assert!(!service.checkpoint_path().exists());
    assert!(!dir.path().join("models").exists());
}

#[test]
fn test_load_missing_checkpoint() {
    let dir = TempDir::new().expect("temp dir");
    let service = service(&dir);

    assert_eq!(service.load_model(), LoadOutcome::NotFound);
    assert!(!service.is_trained());
}

#[test]
fn test_corrupt_checkpoint_resets_to_untrained() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    std::fs::write(service.checkpoint_path(), b"not a checkpoint").expect("corrupt");

    assert!(matches!(service.load_model(), LoadOutcome::Failed { .. }));
    assert!(!service.is_trained());
    assert_eq!(
        service.recommend("s0", &["c0", "c1"], 5),
        neutral(&["c0", "c1"])
    );

    let fresh = RecommendationService::with_device(test_config(&dir), Device::Cpu);
    assert!(!fresh.is_trained());
}

#[test]
fn test_persist_failure_keeps_previous_state() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.checkpoint_path).expect("block path with a directory");

    let service = RecommendationService::with_device(config, Device::Cpu);
    assert!(!service.is_trained());

    let err = service
        .train_model(&scenario_events(), 2)
        .expect_err("checkpoint cannot be written over a directory");

    assert!(matches!(err, ServiceError::Checkpoint(_)));
    assert!(!service.is_trained());
}

#[test]
fn test_custom_approve_direction() {
    let dir = TempDir::new().expect("temp dir");
    let service = RecommendationService::with_device(
        test_config(&dir).with_approve_direction("approve"),
        Device::Cpu,
    );

    let events: Vec<FeedbackEvent> = (0..10)
        .map(|i| FeedbackEvent::new(format!("s{}", i % 2), format!("c{}", i % 5), "approve"))
        .collect();

    assert!(service.train_model(&events, 2).expect("train").is_trained());
    assert!(service.knows_seeker("s1"));
    assert!(service.knows_candidate("c4"));
}

#[test]
fn test_recommend_during_training_sees_whole_models() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);
    let cands = candidates();

    let mut bigger = scenario_events();
    bigger.push(FeedbackEvent::approve("s3", "c4"));

    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let ranked = service.recommend("s0", &cands, 4);
                        assert_eq!(ranked.len(), 4);
                        assert!(ranked.iter().all(|r| (0.0..=1.0).contains(&r.score)));
                        let snapshot = service.snapshot().expect("trained");
                        assert_eq!(
                            snapshot.model.num_seekers(),
                            snapshot.index.num_seekers()
                        );
                    }
                })
            })
            .collect();

        service.train_model(&bigger, 3).expect("retrain");

        for reader in readers {
            reader.join().expect("reader panicked");
        }
    });

    assert_eq!(service.num_seekers(), Some(4));
    assert_eq!(service.num_candidates(), Some(5));
}

#[test]
fn test_save_during_retrain_keeps_disk_and_memory_in_step() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    let mut bigger = scenario_events();
    bigger.push(FeedbackEvent::approve("s3", "c4"));

    std::thread::scope(|scope| {
        let saver = scope.spawn(|| {
            for _ in 0..20 {
                service.save_model().expect("save").expect("trained model saved");
            }
        });

        service.train_model(&bigger, 3).expect("retrain");
        saver.join().expect("saver panicked");
    });

    let fresh = RecommendationService::with_device(test_config(&dir), Device::Cpu);
    assert_eq!(fresh.num_seekers(), service.num_seekers());
    assert_eq!(fresh.num_seekers(), Some(4));
    assert_eq!(
        fresh.recommend("s3", &["c4", "c0"], 2),
        service.recommend("s3", &["c4", "c0"], 2)
    );
}

#[test]
fn test_load_during_retrain_never_installs_stale_model() {
    let dir = TempDir::new().expect("temp dir");
    let service = trained_service(&dir);

    let mut bigger = scenario_events();
    bigger.push(FeedbackEvent::approve("s3", "c4"));

    std::thread::scope(|scope| {
        let loader = scope.spawn(|| {
            for _ in 0..20 {
                assert!(matches!(service.load_model(), LoadOutcome::Loaded { .. }));
            }
        });

        service.train_model(&bigger, 3).expect("retrain");
        loader.join().expect("loader panicked");
    });

    assert_eq!(service.num_seekers(), Some(4));
    assert!(service.knows_seeker("s3"));
}

#[test]
fn test_recommend_default_uses_configured_top_k() {
    let dir = TempDir::new().expect("temp dir");
    let untrained =
        RecommendationService::with_device(test_config(&dir).with_top_k(2), Device::Cpu);
    assert_eq!(
        untrained.recommend_default("s0", &["c1", "c2", "c3"]),
        neutral(&["c1", "c2"])
    );

    let trained = trained_service(&dir);
    assert_eq!(trained.config().top_k, 10);
    assert_eq!(trained.recommend_default("s0", &candidates()).len(), 4);
    assert_eq!(
        trained.recommend_default("s0", &candidates()),
        trained.recommend("s0", &candidates(), 10)
    );
}

#[test]
fn test_service_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecommendationService>();
}
