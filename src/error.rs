// src/error.rs
use thiserror::Error;

/// Domain failures of the matching and canonicalisation core.
///
/// Storage failures are not represented here; they travel as `anyhow::Error`
/// with context attached at the I/O boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error(
        "insufficient training data: {positives} positive and {negatives} negative decided pairs, \
         need at least {required} of each"
    )]
    InsufficientTrainingData {
        positives: usize,
        negatives: usize,
        required: usize,
    },

    #[error("pair ({left}, {right}) is stored in both orders with conflicting judgements")]
    AmbiguousPairKey { left: String, right: String },

    #[error("cannot judge entity {0} against itself")]
    SelfPair(String),

    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),
}
