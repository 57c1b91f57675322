//! Affinity training job entrypoint.
//!
//! Usage: `affinity [FEEDBACK_JSON] [--synthetic]`

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use mimalloc::MiMalloc;
use rand::SeedableRng;
use rand::rngs::StdRng;

use affinity::config::Config;
use affinity::constants::MIN_TRAINING_EVENTS;
use affinity::feedback::FeedbackEvent;
use affinity::service::{RecommendationService, TrainingOutcome};
use affinity::synthetic::{SyntheticConfig, generate_feedback_with, placeholder_ids};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const FALLBACK_POPULATION: usize = 10;
const SAMPLE_CANDIDATES: usize = 5;
const SAMPLE_TOP_K: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let synthetic = std::env::args().skip(1).any(|arg| arg == "--synthetic");
    let feedback_path = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from);

    tracing::info!(
        checkpoint_path = %config.checkpoint_path.display(),
        epochs = config.epochs,
        batch_size = config.batch_size,
        learning_rate = config.learning_rate,
        "Affinity training job starting"
    );

    let mut events = match &feedback_path {
        Some(path) => load_feedback(path).await?,
        None => {
            tracing::warn!("No feedback file given, starting with empty feedback");
            Vec::new()
        }
    };
    tracing::info!(events = events.len(), "Feedback loaded");

    if events.len() < MIN_TRAINING_EVENTS && synthetic {
        let generated = synthesize(&events, &config.approve_direction);
        tracing::info!(
            generated = generated.len(),
            "Not enough feedback, adding synthetic demo data"
        );
        events.extend(generated);
    }

    let service_config = config.service_config();
    let epochs = config.epochs;
    let train_events = events.clone();
    let (service, outcome) = tokio::task::spawn_blocking(move || {
        let service = RecommendationService::new(service_config)?;
        let outcome = service.train_model(&train_events, epochs)?;
        anyhow::Ok((service, outcome))
    })
    .await
    .context("training task panicked")??;

    match outcome {
        TrainingOutcome::Trained {
            num_seekers,
            num_candidates,
            examples,
            final_loss,
            checkpoint_bytes,
        } => {
            tracing::info!(
                num_seekers,
                num_candidates,
                examples,
                final_loss = ?final_loss,
                checkpoint_bytes,
                "Training finished"
            );
            log_sample_recommendations(&service, &events);
        }
        TrainingOutcome::Skipped { reason } => {
            tracing::warn!(reason = ?reason, "Training skipped");
        }
    }

    Ok(())
}

async fn load_feedback(path: &Path) -> anyhow::Result<Vec<FeedbackEvent>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read feedback file {}", path.display()))?;
    let events: Vec<FeedbackEvent> = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse feedback file {}", path.display()))?;
    Ok(events)
}

/// Synthetic feedback over the ids already seen, or a placeholder population when there are none.
fn synthesize(events: &[FeedbackEvent], approve_direction: &str) -> Vec<FeedbackEvent> {
    let mut seekers = distinct(events.iter().map(|e| e.seeker_id.as_str()));
    let mut candidates = distinct(events.iter().map(|e| e.candidate_id.as_str()));
    if seekers.is_empty() {
        seekers = placeholder_ids("seeker", FALLBACK_POPULATION);
    }
    if candidates.is_empty() {
        candidates = placeholder_ids("candidate", FALLBACK_POPULATION);
    }

    let synthetic_config = SyntheticConfig::default().with_approve_direction(approve_direction);
    let mut rng = StdRng::from_entropy();
    generate_feedback_with(&seekers, &candidates, &synthetic_config, &mut rng)
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn log_sample_recommendations(service: &RecommendationService, events: &[FeedbackEvent]) {
    let Some(first) = events.first() else {
        return;
    };
    let candidates: Vec<&str> = events
        .iter()
        .take(SAMPLE_CANDIDATES)
        .map(|e| e.candidate_id.as_str())
        .collect();

    let recommendations = service.recommend(&first.seeker_id, &candidates, SAMPLE_TOP_K);
    tracing::info!(seeker_id = %first.seeker_id, "Sample recommendations");
    for rec in recommendations {
        tracing::info!("  {}: {:.4}", rec.candidate_id, rec.score);
    }
}
