// src/models/judgement.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order-independent key of an entity pair. The smaller uid (byte-wise) is
/// always stored first, so `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    left: String,
    right: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                left: a.to_string(),
                right: b.to_string(),
            }
        } else {
            Self {
                left: b.to_string(),
                right: a.to_string(),
            }
        }
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn is_self_pair(&self) -> bool {
        self.left == self.right
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Judgement {
    Positive,
    Negative,
    Undecided,
}

impl Judgement {
    /// Stored form: a nullable boolean, NULL meaning undecided.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Judgement::Positive => Some(true),
            Judgement::Negative => Some(false),
            Judgement::Undecided => None,
        }
    }

    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Judgement::Positive,
            Some(false) => Judgement::Negative,
            None => Judgement::Undecided,
        }
    }

    pub fn is_decided(self) -> bool {
        self != Judgement::Undecided
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgement::Positive => write!(f, "true"),
            Judgement::Negative => write!(f, "false"),
            Judgement::Undecided => write!(f, "undecided"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgementRecord {
    pub key: PairKey,
    pub judgement: Judgement,
    pub score: Option<f64>,
}

/// A judgement row exactly as the store returned it; the uids may be in either order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredJudgement {
    pub left_uid: String,
    pub right_uid: String,
    pub judgement: Judgement,
    pub score: Option<f64>,
}
