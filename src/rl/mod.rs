pub mod feature_extraction;
pub mod logistic;
pub mod pairwise_scorer;

pub use logistic::{LogisticPairScorer, OnlineLogisticRegression};
pub use pairwise_scorer::{training_signature, FeatureRecord, LabeledPair, PairwiseScorer};
