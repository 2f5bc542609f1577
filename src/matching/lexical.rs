// src/matching/lexical.rs - Edit-distance candidates over name fingerprints
use indicatif::MultiProgress;

use super::name::fingerprint;
use super::{pair_count, sorted_pool, CandidateOutcome};
use crate::error::ResolveError;
use crate::ledger::{EmitOutcome, JudgementLedger};
use crate::models::stats_models::MatchMethodType;
use crate::models::{Entity, Judgement, PairKey};
use crate::utils::config::LexicalConfig;
use crate::utils::progress_bars::logging::MatchingLogger;
use crate::utils::progress_bars::progress_config::pair_progress_bar;

/// Similarity of two fingerprints in [0, 1], from character-level edit distance.
/// `None` when both are empty.
pub fn lexical_score(fp_a: &str, fp_b: &str) -> Option<f64> {
    let longest = fp_a.chars().count().max(fp_b.chars().count());
    if longest == 0 {
        return None;
    }
    let distance = strsim::levenshtein(fp_a, fp_b);
    Some(1.0 - distance as f64 / longest as f64)
}

pub fn generate_candidates_lexical(
    entities: &[Entity],
    config: &LexicalConfig,
    ledger: &mut JudgementLedger,
) -> Result<CandidateOutcome, ResolveError> {
    generate_candidates_lexical_with_progress(entities, config, ledger, None)
}

/// Emits an undecided judgement for every undecided pair whose fingerprint
/// similarity is strictly above the threshold.
pub fn generate_candidates_lexical_with_progress(
    entities: &[Entity],
    config: &LexicalConfig,
    ledger: &mut JudgementLedger,
    multi_progress: Option<&MultiProgress>,
) -> Result<CandidateOutcome, ResolveError> {
    let logger = MatchingLogger::new(MatchMethodType::Lexical);
    logger.log_start(entities.len());
    let mut outcome = CandidateOutcome::new(MatchMethodType::Lexical);

    if config.replace_existing_candidates {
        outcome.undecided_deleted = ledger.delete_undecided();
        logger.log_phase(
            "Cleared candidates",
            Some(&format!("{} undecided judgements removed", outcome.undecided_deleted)),
        );
    }

    let pool = sorted_pool(entities);
    let fingerprints: Vec<String> = pool
        .iter()
        .map(|e| fingerprint(e.name.as_deref()))
        .collect();
    logger.log_existing_pairs(ledger.decided_pairs().len());

    let pb = pair_progress_bar(multi_progress, pair_count(pool.len()), "lexical pairs");
    for i in 0..pool.len() {
        for j in (i + 1)..pool.len() {
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            let key = PairKey::new(&pool[i].uid, &pool[j].uid);
            if ledger.is_decided(&key) {
                outcome.skipped_decided += 1;
                continue;
            }
            outcome.pairs_compared += 1;

            let score = match lexical_score(&fingerprints[i], &fingerprints[j]) {
                Some(s) => s,
                None => continue,
            };
            if score <= config.threshold {
                continue;
            }
            logger.log_candidate(key.left(), key.right(), score);
            let result = ledger.emit(key.left(), key.right(), Judgement::Undecided, Some(score))?;
            outcome.record_candidate(
                key.left(),
                key.right(),
                score,
                result == EmitOutcome::Written,
            );
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    logger.log_pair_generation(outcome.pairs_compared, outcome.skipped_decided);
    logger.log_completion(&outcome.to_stats());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: f64) -> LexicalConfig {
        LexicalConfig {
            threshold,
            replace_existing_candidates: false,
        }
    }

    #[test]
    fn test_lexical_score() {
        assert_eq!(lexical_score("", ""), None);
        assert_eq!(lexical_score("acme", "acme"), Some(1.0));
        assert_eq!(lexical_score("acme", ""), Some(0.0));
        assert_eq!(lexical_score("abcd", "abce"), Some(0.75));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // "abcd" vs "abce" scores exactly 0.75.
        let entities = vec![
            Entity::new("a", Some("abcd"), "x"),
            Entity::new("b", Some("abce"), "y"),
        ];
        let mut ledger = JudgementLedger::new();
        let at = generate_candidates_lexical(&entities, &config(0.75), &mut ledger).unwrap();
        assert_eq!(at.candidates, 0);
        assert!(ledger.is_empty());

        let below = generate_candidates_lexical(&entities, &config(0.74), &mut ledger).unwrap();
        assert_eq!(below.candidates, 1);
        let record = ledger.get("b", "a").unwrap();
        assert_eq!(record.judgement, Judgement::Undecided);
        assert_eq!(record.score, Some(0.75));
    }

    #[test]
    fn test_decided_pairs_are_skipped() {
        let entities = vec![
            Entity::new("a", Some("Acme Holdings"), "x"),
            Entity::new("b", Some("Acme Holding"), "y"),
        ];
        let mut ledger = JudgementLedger::new();
        ledger.emit("a", "b", Judgement::Negative, None).unwrap();
        let outcome = generate_candidates_lexical(&entities, &config(0.5), &mut ledger).unwrap();
        assert_eq!(outcome.skipped_decided, 1);
        assert_eq!(outcome.candidates, 0);
        assert_eq!(ledger.get("a", "b").unwrap().judgement, Judgement::Negative);
    }

    #[test]
    fn test_unnamed_pairs_are_excluded() {
        let entities = vec![Entity::new("a", None, "x"), Entity::new("b", Some("Inc"), "y")];
        let mut ledger = JudgementLedger::new();
        let outcome = generate_candidates_lexical(&entities, &config(-1.0), &mut ledger).unwrap();
        assert_eq!(outcome.pairs_compared, 1);
        assert_eq!(outcome.candidates, 0);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let entities = vec![
            Entity::new("a", Some("Acme Holdings"), "x"),
            Entity::new("b", Some("Acme Holding Ltd"), "y"),
            Entity::new("c", Some("Zenith"), "y"),
        ];
        let mut ledger = JudgementLedger::new();
        let first = generate_candidates_lexical(&entities, &config(0.5), &mut ledger).unwrap();
        let snapshot: Vec<_> = ledger.iter().cloned().collect();
        let pending = ledger.pending_writes();

        let second = generate_candidates_lexical(&entities, &config(0.5), &mut ledger).unwrap();
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(second.written, 0);
        assert_eq!(ledger.iter().cloned().collect::<Vec<_>>(), snapshot);
        assert_eq!(ledger.pending_writes(), pending);
    }

    #[test]
    fn test_replace_existing_candidates() {
        let entities = vec![Entity::new("a", Some("Acme"), "x"), Entity::new("b", Some("Zenith"), "y")];
        let mut ledger = JudgementLedger::new();
        ledger.emit("a", "b", Judgement::Undecided, Some(0.9)).unwrap();
        let cfg = LexicalConfig {
            threshold: 0.5,
            replace_existing_candidates: true,
        };
        let outcome = generate_candidates_lexical(&entities, &cfg, &mut ledger).unwrap();
        assert_eq!(outcome.undecided_deleted, 1);
        assert!(ledger.is_empty());
    }
}
