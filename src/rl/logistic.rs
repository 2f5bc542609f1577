// src/rl/logistic.rs
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::feature_extraction::{extract_pair_features, FEATURE_NAMES, FEATURE_VECTOR_SIZE};
use super::pairwise_scorer::{check_class_balance, FeatureRecord, LabeledPair, PairwiseScorer};
use crate::error::ResolveError;
use crate::utils::config::TrainingConfig;

// A lightweight logistic regression model trained via online gradient descent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OnlineLogisticRegression {
    // Feature weights followed by the bias term.
    weights: Vec<f64>,
    learning_rate: f64,
    trials: usize,
}

impl OnlineLogisticRegression {
    pub fn new(feature_count: usize, learning_rate: f64) -> Self {
        Self {
            weights: vec![0.0; feature_count + 1],
            learning_rate,
            trials: 0,
        }
    }

    fn feature_count(&self) -> usize {
        self.weights.len() - 1
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Feature weights paired with their names, bias excluded.
    pub fn named_weights(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.weights.iter().copied())
            .collect()
    }

    // Predicts the probability that the pair is a match.
    pub fn predict(&self, features: &[f64]) -> f64 {
        if features.len() != self.feature_count() {
            warn!(
                "Expected {} features, but got {}. Prediction will be unreliable.",
                self.feature_count(),
                features.len()
            );
            return 0.5;
        }
        let features_with_bias = features.iter().chain(std::iter::once(&1.0));
        let logit: f64 = self
            .weights
            .iter()
            .zip(features_with_bias)
            .map(|(w, f)| w * f)
            .sum();
        1.0 / (1.0 + (-logit).exp())
    }

    // Updates the model weights based on a single training example.
    pub fn update(&mut self, features: &[f64], label: f64) {
        if features.len() != self.feature_count() {
            warn!("Skipping model update due to feature vector length mismatch.");
            return;
        }
        let error = label - self.predict(features);
        for (i, feature_val) in features.iter().enumerate() {
            self.weights[i] += self.learning_rate * error * feature_val;
        }
        let bias_index = self.weights.len() - 1;
        self.weights[bias_index] += self.learning_rate * error;
        self.trials += 1;
    }
}

/// `PairwiseScorer` backed by `OnlineLogisticRegression` over the pair features.
#[derive(Debug, Clone, Default)]
pub struct LogisticPairScorer {
    config: TrainingConfig,
}

impl LogisticPairScorer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }
}

impl PairwiseScorer for LogisticPairScorer {
    type Model = OnlineLogisticRegression;

    fn train(&self, examples: &[LabeledPair]) -> Result<Self::Model, ResolveError> {
        let (positives, negatives) =
            check_class_balance(examples, self.config.min_examples_per_class)?;

        let samples: Vec<(Vec<f64>, f64)> = examples
            .iter()
            .map(|e| {
                let label = if e.positive { 1.0 } else { 0.0 };
                (extract_pair_features(&e.left, &e.right), label)
            })
            .collect();

        let mut model = OnlineLogisticRegression::new(FEATURE_VECTOR_SIZE, self.config.learning_rate);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..samples.len()).collect();
        for _ in 0..self.config.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let (features, label) = &samples[i];
                model.update(features, *label);
            }
        }
        debug!(
            "Trained logistic scorer on {} positive / {} negative examples ({} updates)",
            positives,
            negatives,
            model.trials()
        );
        for (name, weight) in model.named_weights() {
            debug!("  {:<24} {:+.4}", name, weight);
        }
        Ok(model)
    }

    fn score(&self, model: &Self::Model, a: &FeatureRecord, b: &FeatureRecord) -> f64 {
        model.predict(&extract_pair_features(a, b)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;

    fn record(uid: &str, name: &str) -> FeatureRecord {
        FeatureRecord::from_entity(&Entity::new(uid, Some(name), "src"))
    }

    fn examples() -> Vec<LabeledPair> {
        let pair = |a: (&str, &str), b: (&str, &str), positive| LabeledPair {
            left: record(a.0, a.1),
            right: record(b.0, b.1),
            positive,
        };
        vec![
            pair(("a1", "Acme Holdings"), ("a2", "Acme Holdings Ltd"), true),
            pair(("b1", "Blue River Mining"), ("b2", "Blue River Mining Inc"), true),
            pair(("c1", "Cobalt Partners"), ("c2", "Zenith Shipping"), false),
            pair(("d1", "Delta Trust"), ("d2", "Northern Lights Ltd"), false),
        ]
    }

    #[test]
    fn test_predict_starts_neutral() {
        let model = OnlineLogisticRegression::new(3, 0.1);
        assert_eq!(model.predict(&[0.2, 0.4, 0.6]), 0.5);
        assert_eq!(model.predict(&[0.2]), 0.5);
    }

    #[test]
    fn test_training_is_deterministic_and_separates_classes() {
        let scorer = LogisticPairScorer::default();
        let first = scorer.train(&examples()).unwrap();
        let second = scorer.train(&examples()).unwrap();
        assert_eq!(first, second);

        let same = scorer.score(&first, &record("x", "Acme Holdings"), &record("y", "ACME Holdings Inc"));
        let different = scorer.score(&first, &record("x", "Acme Holdings"), &record("y", "Quartz Ventures"));
        assert!(same > 0.5, "same-name score {}", same);
        assert!(different < 0.5, "different-name score {}", different);
    }

    #[test]
    fn test_named_weights_follow_feature_order() {
        let model = LogisticPairScorer::default().train(&examples()).unwrap();
        let weights = model.named_weights();
        assert_eq!(weights.len(), FEATURE_VECTOR_SIZE);
        assert_eq!(weights[0].0, "name_jaro_winkler");
        // Name similarity separates the positive pairs from the negative ones.
        assert!(weights[0].1 > 0.0);
    }

    #[test]
    fn test_training_requires_both_classes() {
        let scorer = LogisticPairScorer::new(TrainingConfig {
            min_examples_per_class: 3,
            ..TrainingConfig::default()
        });
        let err = scorer.train(&examples()).unwrap_err();
        assert_eq!(
            err,
            ResolveError::InsufficientTrainingData {
                positives: 2,
                negatives: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_model_round_trips_through_json() {
        let model = LogisticPairScorer::default().train(&examples()).unwrap();
        let json = serde_json::to_value(&model).unwrap();
        let restored: OnlineLogisticRegression = serde_json::from_value(json).unwrap();
        assert_eq!(restored.trials(), model.trials());
        let features = extract_pair_features(&record("x", "Acme"), &record("y", "Acme Inc"));
        assert!((restored.predict(&features) - model.predict(&features)).abs() < 1e-9);
    }
}
