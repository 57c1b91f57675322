//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use affinity::constants::ModelDims;
use affinity::feedback::FeedbackEvent;
use affinity::service::{RecommendationService, ServiceConfig};
use affinity::training::TrainerConfig;
use candle_core::Device;
use tempfile::TempDir;

pub fn checkpoint_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("preference_model.rkyv")
}

/// Small architecture so the suite stays fast on CPU.
pub fn small_config(dir: &TempDir) -> ServiceConfig {
    ServiceConfig::new(checkpoint_path(dir))
        .with_dims(ModelDims::new(8, vec![16, 8]))
        .with_trainer(TrainerConfig::default().with_seed(42))
}

pub fn cpu_service(config: ServiceConfig) -> RecommendationService {
    RecommendationService::with_device(config, Device::Cpu)
}

/// Two seekers with opposite tastes over four candidates, repeated so training has signal.
pub fn polarized_events() -> Vec<FeedbackEvent> {
    let mut events = Vec::new();
    for _ in 0..3 {
        for c in ["a", "b"] {
            events.push(FeedbackEvent::approve("alice", c));
            events.push(FeedbackEvent::reject("bob", c));
        }
        for c in ["x", "y"] {
            events.push(FeedbackEvent::reject("alice", c));
            events.push(FeedbackEvent::approve("bob", c));
        }
    }
    events
}
