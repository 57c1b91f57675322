//! Synthetic demo feedback for bootstrapping a model when real history is too thin.
//!
//! Each seeker rates a random handful of distinct candidates, approving with a fixed
//! probability. Only intended for demos and smoke tests.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::constants::{DEFAULT_APPROVE_DIRECTION, DEFAULT_REJECT_DIRECTION};
use crate::feedback::FeedbackEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub min_per_seeker: usize,
    pub max_per_seeker: usize,
    pub approve_probability: f64,
    pub approve_direction: String,
    pub reject_direction: String,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            min_per_seeker: 3,
            max_per_seeker: 5,
            approve_probability: 0.7,
            approve_direction: DEFAULT_APPROVE_DIRECTION.to_string(),
            reject_direction: DEFAULT_REJECT_DIRECTION.to_string(),
        }
    }
}

impl SyntheticConfig {
    pub fn with_approve_direction(mut self, approve_direction: impl Into<String>) -> Self {
        self.approve_direction = approve_direction.into();
        self
    }
}

/// Generates feedback with [`SyntheticConfig::default`].
pub fn generate_feedback<R: Rng + ?Sized>(
    seekers: &[String],
    candidates: &[String],
    rng: &mut R,
) -> Vec<FeedbackEvent> {
    generate_feedback_with(seekers, candidates, &SyntheticConfig::default(), rng)
}

pub fn generate_feedback_with<R: Rng + ?Sized>(
    seekers: &[String],
    candidates: &[String],
    config: &SyntheticConfig,
    rng: &mut R,
) -> Vec<FeedbackEvent> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let lo = config.min_per_seeker.min(config.max_per_seeker);
    let hi = config.max_per_seeker.max(lo);
    let probability = config.approve_probability.clamp(0.0, 1.0);

    let mut events = Vec::new();
    for seeker in seekers {
        let wanted = rng.gen_range(lo..=hi).min(candidates.len());
        for candidate in candidates.choose_multiple(rng, wanted) {
            let direction = if rng.gen_bool(probability) {
                &config.approve_direction
            } else {
                &config.reject_direction
            };
            events.push(FeedbackEvent::new(
                seeker.as_str(),
                candidate.as_str(),
                direction.as_str(),
            ));
        }
    }
    events
}

/// `prefix_0 .. prefix_{n-1}`, used when no real identifiers are available.
pub fn placeholder_ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}_{}", prefix, i)).collect()
}
