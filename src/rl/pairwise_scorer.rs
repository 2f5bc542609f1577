// src/rl/pairwise_scorer.rs - Trainable pair classifier seam
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;
use crate::matching::name::{fingerprint, normalize_name, tokenize_name};
use crate::models::{Entity, PairKey};

/// Per-entity view the classifier sees.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub uid: String,
    pub normalized_name: String,
    pub fingerprint: String,
    pub tokens: BTreeSet<String>,
    pub origin: String,
    pub attributes: BTreeMap<String, String>,
}

impl FeatureRecord {
    pub fn from_entity(entity: &Entity) -> Self {
        let normalized_name = normalize_name(entity.name.as_deref());
        Self {
            uid: entity.uid.clone(),
            fingerprint: fingerprint(entity.name.as_deref()),
            tokens: tokenize_name(&normalized_name),
            normalized_name,
            origin: entity.origin.clone(),
            attributes: entity.attributes.clone(),
        }
    }
}

/// A decided pair used as a training example. `left` holds the smaller uid.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPair {
    pub left: FeatureRecord,
    pub right: FeatureRecord,
    pub positive: bool,
}

impl LabeledPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.left.uid, &self.right.uid)
    }
}

pub trait PairwiseScorer {
    type Model;

    /// Fits a model. The same examples in the same order give the same model.
    fn train(&self, examples: &[LabeledPair]) -> Result<Self::Model, ResolveError>;

    /// Probability in [0, 1] that both records describe the same entity.
    fn score(&self, model: &Self::Model, a: &FeatureRecord, b: &FeatureRecord) -> f64;
}

/// Counts (positives, negatives) and fails when either class is below `required`.
pub fn check_class_balance(
    examples: &[LabeledPair],
    required: usize,
) -> Result<(usize, usize), ResolveError> {
    let positives = examples.iter().filter(|e| e.positive).count();
    let negatives = examples.len() - positives;
    if positives < required || negatives < required {
        return Err(ResolveError::InsufficientTrainingData {
            positives,
            negatives,
            required,
        });
    }
    Ok((positives, negatives))
}

/// Hex SHA-256 over the sorted examples: pair key, label and both fingerprints.
/// A stored model is only reused while this matches.
pub fn training_signature(examples: &[LabeledPair]) -> String {
    let mut lines: Vec<String> = examples
        .iter()
        .map(|e| {
            format!(
                "{}\0{}\0{}\0{}\0{}",
                e.left.uid, e.right.uid, e.positive, e.left.fingerprint, e.right.fingerprint
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(a: &str, b: &str, positive: bool) -> LabeledPair {
        LabeledPair {
            left: FeatureRecord::from_entity(&Entity::new(a, Some("Acme"), "x")),
            right: FeatureRecord::from_entity(&Entity::new(b, Some("Acme Ltd"), "y")),
            positive,
        }
    }

    #[test]
    fn test_feature_record_from_entity() {
        let record = FeatureRecord::from_entity(&Entity::new("e1", Some("Zenith Holdings Limited"), "reg"));
        assert_eq!(record.normalized_name, "zenith holdings limited");
        assert_eq!(record.fingerprint, "holdings zenith");
        assert_eq!(record.tokens.len(), 3);
    }

    #[test]
    fn test_class_balance() {
        let examples = vec![labeled("a", "b", true), labeled("c", "d", false)];
        assert_eq!(check_class_balance(&examples, 1), Ok((1, 1)));
        assert_eq!(
            check_class_balance(&examples, 2),
            Err(ResolveError::InsufficientTrainingData {
                positives: 1,
                negatives: 1,
                required: 2
            })
        );
    }

    #[test]
    fn test_signature_ignores_order_but_not_labels() {
        let forward = vec![labeled("a", "b", true), labeled("c", "d", false)];
        let reversed = vec![labeled("c", "d", false), labeled("a", "b", true)];
        let flipped = vec![labeled("a", "b", false), labeled("c", "d", false)];
        assert_eq!(training_signature(&forward), training_signature(&reversed));
        assert_ne!(training_signature(&forward), training_signature(&flipped));
    }
}
