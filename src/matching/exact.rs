// src/matching/exact.rs - Positive judgements for entities sharing a normalized name
use std::collections::{BTreeMap, BTreeSet};

use super::name::normalize_name;
use crate::error::ResolveError;
use crate::ledger::{EmitOutcome, JudgementLedger};
use crate::models::stats_models::{MatchMethodStats, MatchMethodType};
use crate::models::{Entity, Judgement};
use crate::utils::origin_filter::OriginFilterConfig;
use crate::utils::progress_bars::logging::MatchingLogger;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactMergeOutcome {
    /// Name groups with two or more members.
    pub groups: usize,
    pub pairs_emitted: usize,
    /// Pairs that were already positive.
    pub pairs_unchanged: usize,
    /// Pairs left negative despite sharing a name.
    pub conflicts_preserved: usize,
    pub entities_matched: usize,
}

impl ExactMergeOutcome {
    pub fn to_stats(&self) -> MatchMethodStats {
        MatchMethodStats {
            method_type: MatchMethodType::Exact,
            judgements_emitted: self.pairs_emitted,
            entities_matched: self.entities_matched,
            pairs_compared: self.pairs_emitted + self.pairs_unchanged + self.conflicts_preserved,
            avg_score: 1.0,
            skipped_reason: None,
        }
    }
}

/// Groups entities by normalized name and records every pair inside a group
/// as the same entity. Negative decisions already in the ledger win.
pub fn exact_merge(
    entities: &[Entity],
    origin_filter: &OriginFilterConfig,
    ledger: &mut JudgementLedger,
) -> Result<ExactMergeOutcome, ResolveError> {
    let logger = MatchingLogger::new(MatchMethodType::Exact);
    logger.log_start(entities.len());

    let mut groups: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    let mut unnamed = 0usize;
    for entity in entities.iter().filter(|e| origin_filter.accepts(e)) {
        let key = normalize_name(entity.name.as_deref());
        if key.is_empty() {
            unnamed += 1;
            continue;
        }
        groups.entry(key).or_default().insert(entity.uid.as_str());
    }
    if unnamed > 0 {
        logger.log_debug(&format!("{} entities without a usable name skipped", unnamed));
    }

    let mut outcome = ExactMergeOutcome::default();
    for (key, members) in groups.iter().filter(|(_, m)| m.len() >= 2) {
        logger.log_group(key, members.len());
        outcome.groups += 1;
        outcome.entities_matched += members.len();

        let members: Vec<&str> = members.iter().copied().collect();
        for (i, uid_a) in members.iter().enumerate() {
            for uid_b in &members[i + 1..] {
                match ledger.emit(uid_a, uid_b, Judgement::Positive, None)? {
                    EmitOutcome::Written => outcome.pairs_emitted += 1,
                    EmitOutcome::Unchanged => outcome.pairs_unchanged += 1,
                    EmitOutcome::PreservedDecision => {
                        let negative = ledger
                            .get(uid_a, uid_b)
                            .map(|r| r.judgement == Judgement::Negative)
                            .unwrap_or(false);
                        if negative {
                            outcome.conflicts_preserved += 1;
                        } else {
                            outcome.pairs_unchanged += 1;
                        }
                    }
                }
            }
        }
    }

    if outcome.conflicts_preserved > 0 {
        logger.log_warning(&format!(
            "{} same-name pairs kept as negative",
            outcome.conflicts_preserved
        ));
    }
    logger.log_completion(&outcome.to_stats());
    Ok(outcome)
}
