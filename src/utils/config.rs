// src/utils/config.rs - Pass configuration read from the environment
use log::info;
use serde::{Deserialize, Serialize};

use super::env::env_or;

/// Settings for the edit-distance candidate pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalConfig {
    /// Pairs must score strictly above this to become candidates.
    pub threshold: f64,
    /// Drop existing undecided entries before generating.
    pub replace_existing_candidates: bool,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            replace_existing_candidates: false,
        }
    }
}

/// Settings for training the pairwise classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub min_examples_per_class: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_examples_per_class: 2,
            epochs: 200,
            learning_rate: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnedConfig {
    pub threshold: f64,
    /// Reuse a stored model when its training signature matches the ledger.
    pub reuse_model: bool,
    pub training: TrainingConfig,
}

impl Default for LearnedConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            reuse_model: true,
            training: TrainingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub lexical: LexicalConfig,
    pub learned: LearnedConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            lexical: LexicalConfig {
                threshold: env_or("LEXICAL_THRESHOLD", defaults.lexical.threshold),
                replace_existing_candidates: env_or(
                    "LEXICAL_REPLACE_CANDIDATES",
                    defaults.lexical.replace_existing_candidates,
                ),
            },
            learned: LearnedConfig {
                threshold: env_or("LEARNED_THRESHOLD", defaults.learned.threshold),
                reuse_model: env_or("REUSE_MODEL", defaults.learned.reuse_model),
                training: TrainingConfig {
                    min_examples_per_class: env_or(
                        "MIN_TRAINING_EXAMPLES_PER_CLASS",
                        defaults.learned.training.min_examples_per_class,
                    ),
                    epochs: env_or("TRAINING_EPOCHS", defaults.learned.training.epochs),
                    learning_rate: env_or(
                        "TRAINING_LEARNING_RATE",
                        defaults.learned.training.learning_rate,
                    ),
                    seed: env_or("TRAINING_SEED", defaults.learned.training.seed),
                },
            },
        }
    }

    pub fn log_config(&self) {
        info!("⚙️  Pipeline configuration:");
        info!(
            "   • Lexical threshold: {:.3} (replace candidates: {})",
            self.lexical.threshold, self.lexical.replace_existing_candidates
        );
        info!(
            "   • Learned threshold: {:.3} (reuse model: {})",
            self.learned.threshold, self.learned.reuse_model
        );
        info!(
            "   • Training: {} epochs, learning rate {}, seed {}, min {} examples per class",
            self.learned.training.epochs,
            self.learned.training.learning_rate,
            self.learned.training.seed,
            self.learned.training.min_examples_per_class
        );
    }
}
