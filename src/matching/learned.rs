// src/matching/learned.rs - Candidates scored by a classifier trained on the ledger's decisions
use indicatif::MultiProgress;
use std::collections::HashMap;

use super::{pair_count, sorted_pool, CandidateOutcome};
use crate::error::ResolveError;
use crate::ledger::{EmitOutcome, JudgementLedger};
use crate::models::stats_models::MatchMethodType;
use crate::models::{Entity, Judgement, PairKey};
use crate::rl::pairwise_scorer::{FeatureRecord, LabeledPair, PairwiseScorer};
use crate::utils::config::LearnedConfig;
use crate::utils::progress_bars::logging::MatchingLogger;
use crate::utils::progress_bars::progress_config::pair_progress_bar;

/// One record per distinct uid, in uid order.
pub fn build_feature_records(entities: &[Entity]) -> Vec<FeatureRecord> {
    sorted_pool(entities)
        .into_iter()
        .map(FeatureRecord::from_entity)
        .collect()
}

/// Decided ledger entries whose uids are both in the pool, in pair-key order.
pub fn collect_training_examples(
    records: &[FeatureRecord],
    ledger: &JudgementLedger,
) -> Vec<LabeledPair> {
    let by_uid: HashMap<&str, &FeatureRecord> =
        records.iter().map(|r| (r.uid.as_str(), r)).collect();
    ledger
        .iter()
        .filter(|r| r.judgement.is_decided())
        .filter_map(|r| {
            let left = by_uid.get(r.key.left())?;
            let right = by_uid.get(r.key.right())?;
            Some(LabeledPair {
                left: (*left).clone(),
                right: (*right).clone(),
                positive: r.judgement == Judgement::Positive,
            })
        })
        .collect()
}

/// Trains on the decided pairs, then replaces every undecided judgement with
/// the pairs the model scores above the threshold. Fails without touching the
/// ledger when there is too little training data.
pub fn generate_candidates_learned<P: PairwiseScorer>(
    entities: &[Entity],
    scorer: &P,
    config: &LearnedConfig,
    ledger: &mut JudgementLedger,
) -> Result<CandidateOutcome, ResolveError> {
    let records = build_feature_records(entities);
    let examples = collect_training_examples(&records, ledger);
    let model = scorer.train(&examples)?;
    MatchingLogger::new(MatchMethodType::Learned).log_training(
        examples.iter().filter(|e| e.positive).count(),
        examples.iter().filter(|e| !e.positive).count(),
        false,
    );
    apply_learned_model(&records, scorer, &model, config.threshold, ledger, None)
}

/// Scoring half of the learned pass, for callers that already hold a model.
pub fn apply_learned_model<P: PairwiseScorer>(
    records: &[FeatureRecord],
    scorer: &P,
    model: &P::Model,
    threshold: f64,
    ledger: &mut JudgementLedger,
    multi_progress: Option<&MultiProgress>,
) -> Result<CandidateOutcome, ResolveError> {
    let logger = MatchingLogger::new(MatchMethodType::Learned);
    logger.log_start(records.len());
    let mut outcome = CandidateOutcome::new(MatchMethodType::Learned);

    outcome.undecided_deleted = ledger.delete_undecided();
    logger.log_phase(
        "Cleared candidates",
        Some(&format!("{} undecided judgements removed", outcome.undecided_deleted)),
    );
    logger.log_existing_pairs(ledger.len());

    let pb = pair_progress_bar(multi_progress, pair_count(records.len()), "learned pairs");
    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            let (a, b) = (&records[i], &records[j]);
            let key = PairKey::new(&a.uid, &b.uid);
            if ledger.is_decided(&key) {
                outcome.skipped_decided += 1;
                continue;
            }
            outcome.pairs_compared += 1;

            let score = scorer.score(model, a, b);
            if score <= threshold {
                continue;
            }
            logger.log_candidate(key.left(), key.right(), score);
            let result = ledger.emit(key.left(), key.right(), Judgement::Undecided, Some(score))?;
            outcome.record_candidate(key.left(), key.right(), score, result == EmitOutcome::Written);
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
    use crate::rl::LogisticPairScorer;

    fn pool() -> Vec<Entity> {
        vec![
            Entity::new("a1", Some("Acme Holdings"), "registry"),
            Entity::new("a2", Some("Acme Holdings Ltd"), "leaks"),
            Entity::new("b1", Some("Blue River Mining"), "registry"),
            Entity::new("b2", Some("Blue River Mining Inc"), "leaks"),
            Entity::new("c1", Some("Cobalt Partners"), "registry"),
            Entity::new("c2", Some("Zenith Shipping"), "leaks"),
            Entity::new("n1", Some("Northern Star Energy"), "registry"),
            Entity::new("n2", Some("Northern Star Energy Limited"), "leaks"),
            Entity::new("q1", Some("Quartz Ventures"), "press"),
        ]
    }

    fn trained_ledger() -> JudgementLedger {
        let mut ledger = JudgementLedger::new();
        ledger.emit("a1", "a2", Judgement::Positive, None).unwrap();
        ledger.emit("b1", "b2", Judgement::Positive, None).unwrap();
        ledger.emit("c1", "c2", Judgement::Negative, None).unwrap();
        ledger.emit("a1", "q1", Judgement::Negative, None).unwrap();
        ledger
    }

    #[test]
    fn test_insufficient_training_data_leaves_ledger_untouched() {
        let mut ledger = JudgementLedger::new();
        ledger.emit("a1", "a2", Judgement::Positive, None).unwrap();
        ledger.emit("c1", "c2", Judgement::Negative, None).unwrap();
        ledger.emit("b1", "b2", Judgement::Undecided, Some(0.9)).unwrap();
        let pending = ledger.pending_writes();

        let err = generate_candidates_learned(
            &pool(),
            &LogisticPairScorer::default(),
            &LearnedConfig::default(),
            &mut ledger,
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::InsufficientTrainingData { positives: 1, negatives: 1, .. }));
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.pending_writes(), pending);
    }

    #[test]
    fn test_training_examples_need_both_uids_in_pool() {
        let mut ledger = trained_ledger();
        ledger.emit("a1", "zz-missing", Judgement::Positive, None).unwrap();
        let records = build_feature_records(&pool());
        let examples = collect_training_examples(&records, &ledger);
        assert_eq!(examples.len(), 4);
        assert_eq!(examples[0].key(), PairKey::new("a1", "a2"));
    }

    #[test]
    fn test_learned_candidates_replace_undecided() {
        let mut ledger = trained_ledger();
        ledger.emit("c2", "q1", Judgement::Undecided, Some(0.99)).unwrap();

        let outcome = generate_candidates_learned(
            &pool(),
            &LogisticPairScorer::default(),
            &LearnedConfig::default(),
            &mut ledger,
        )
        .unwrap();

        assert_eq!(outcome.undecided_deleted, 1);
        assert_eq!(outcome.skipped_decided, 4);
        let candidate = ledger.get("n1", "n2").unwrap();
        assert_eq!(candidate.judgement, Judgement::Undecided);
        assert!(candidate.score.unwrap() > 0.5);
        assert!(ledger.get("c2", "q1").is_none());
        assert_eq!(ledger.get("c1", "c2").unwrap().judgement, Judgement::Negative);
    }

    #[test]
    fn test_rerun_reproduces_the_same_candidates() {
        let scorer = LogisticPairScorer::default();
        let config = LearnedConfig::default();
        let mut ledger = trained_ledger();
        generate_candidates_learned(&pool(), &scorer, &config, &mut ledger).unwrap();
        let first: Vec<_> = ledger.iter().cloned().collect();

        generate_candidates_learned(&pool(), &scorer, &config, &mut ledger).unwrap();
        assert_eq!(ledger.iter().cloned().collect::<Vec<_>>(), first);
    }

    /// Scores every pair with the same value.
    struct FixedScorer(f64);

    impl PairwiseScorer for FixedScorer {
        type Model = ();

        fn train(&self, _examples: &[LabeledPair]) -> Result<(), ResolveError> {
            Ok(())
        }

        fn score(&self, _model: &(), _a: &FeatureRecord, _b: &FeatureRecord) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_score_at_threshold_is_not_a_candidate() {
        let records = build_feature_records(&pool());
        let mut ledger = trained_ledger();

        let at = apply_learned_model(&records, &FixedScorer(0.7), &(), 0.7, &mut ledger, None).unwrap();
        assert_eq!(at.written, 0);
        assert_eq!(ledger.undecided().count(), 0);

        let above = apply_learned_model(&records, &FixedScorer(0.7), &(), 0.69, &mut ledger, None).unwrap();
        // Every undecided pair of the nine-entity pool except the four decided ones.
        assert_eq!(above.written, 36 - 4);
        assert_eq!(ledger.get("n1", "n2").unwrap().score, Some(0.7));
    }
}
