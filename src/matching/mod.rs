// src/matching/mod.rs
pub mod exact;
pub mod learned;
pub mod lexical;
pub mod manager;
pub mod name;

use std::collections::{BTreeMap, BTreeSet};

use crate::models::stats_models::{MatchMethodStats, MatchMethodType};
use crate::models::Entity;

pub use exact::{exact_merge, ExactMergeOutcome};
pub use learned::generate_candidates_learned;
pub use lexical::generate_candidates_lexical;

/// Result of one candidate-generation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutcome {
    pub method_type: MatchMethodType,
    pub pairs_compared: usize,
    pub skipped_decided: usize,
    /// Pairs scoring above the threshold, whether or not the ledger changed.
    pub candidates: usize,
    /// Candidates that changed the ledger.
    pub written: usize,
    pub undecided_deleted: usize,
    pub matched_uids: BTreeSet<String>,
    score_sum: f64,
}

impl CandidateOutcome {
    pub fn new(method_type: MatchMethodType) -> Self {
        Self {
            method_type,
            pairs_compared: 0,
            skipped_decided: 0,
            candidates: 0,
            written: 0,
            undecided_deleted: 0,
            matched_uids: BTreeSet::new(),
            score_sum: 0.0,
        }
    }

    pub(crate) fn record_candidate(&mut self, uid_a: &str, uid_b: &str, score: f64, written: bool) {
        self.candidates += 1;
        if written {
            self.written += 1;
        }
        self.score_sum += score;
        self.matched_uids.insert(uid_a.to_string());
        self.matched_uids.insert(uid_b.to_string());
    }

    pub fn avg_score(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            self.score_sum / self.candidates as f64
        }
    }

    pub fn to_stats(&self) -> MatchMethodStats {
        MatchMethodStats {
            method_type: self.method_type.clone(),
            judgements_emitted: self.written,
            entities_matched: self.matched_uids.len(),
            pairs_compared: self.pairs_compared,
            avg_score: self.avg_score(),
            skipped_reason: None,
        }
    }
}

/// Entities keyed and ordered by uid; a repeated uid keeps its first record.
pub(crate) fn sorted_pool(entities: &[Entity]) -> Vec<&Entity> {
    let mut by_uid: BTreeMap<&str, &Entity> = BTreeMap::new();
    for entity in entities {
        by_uid.entry(entity.uid.as_str()).or_insert(entity);
    }
    by_uid.into_values().collect()
}

/// Number of unordered pairs over `n` items.
pub(crate) fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}
