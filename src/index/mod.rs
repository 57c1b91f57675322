//! Dense integer indices for opaque string identifiers.
//!
//! Built fresh for each training run and never mutated afterwards. Indices are assigned in
//! first-seen order, which keeps runs over the same feedback deterministic. Nothing downstream
//! depends on the order itself.


use std::collections::HashMap;

use crate::feedback::FeedbackEvent;

/// Bijection between identifiers and `0..len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierIndex {
    forward: HashMap<String, u32>,
    reverse: Vec<String>,
}

impl IdentifierIndex {
    /// Deduplicates `ids` and assigns each distinct id the next free index.
    pub fn build<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for id in ids {
            let id = id.as_ref();
            if !index.forward.contains_key(id) {
                let next = index.reverse.len() as u32;
                index.forward.insert(id.to_string(), next);
                index.reverse.push(id.to_string());
            }
        }
        index
    }

    /// Rebuilds an index where `ids[i]` maps to `i`. Returns the first duplicate on failure.
    pub fn from_ordered(ids: Vec<String>) -> Result<Self, String> {
        let mut forward = HashMap::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            if forward.insert(id.clone(), idx as u32).is_some() {
                return Err(id.clone());
            }
        }
        Ok(Self {
            forward,
            reverse: ids,
        })
    }

    pub fn lookup(&self, id: &str) -> Option<u32> {
        self.forward.get(id).copied()
    }

    pub fn reverse(&self, index: u32) -> Option<&str> {
        self.reverse.get(index as usize).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.forward.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Identifiers ordered by index.
    pub fn ids(&self) -> &[String] {
        &self.reverse
    }
}

/// Seeker and candidate indices for one training run.
///
/// The two populations are indexed independently: an identifier that appears as both a
/// seeker and a candidate gets one entry in each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyIndex {
    seekers: IdentifierIndex,
    candidates: IdentifierIndex,
}

impl VocabularyIndex {
    pub fn new(seekers: IdentifierIndex, candidates: IdentifierIndex) -> Self {
        Self {
            seekers,
            candidates,
        }
    }

    pub fn from_events(events: &[FeedbackEvent]) -> Self {
        Self {
            seekers: IdentifierIndex::build(events.iter().map(|e| e.seeker_id.as_str())),
            candidates: IdentifierIndex::build(events.iter().map(|e| e.candidate_id.as_str())),
        }
    }

    pub fn seekers(&self) -> &IdentifierIndex {
        &self.seekers
    }

    pub fn candidates(&self) -> &IdentifierIndex {
        &self.candidates
    }

    pub fn num_seekers(&self) -> usize {
        self.seekers.len()
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }
}
