// src/models/mod.rs
pub mod core;
pub mod judgement;
pub mod stats_models;

pub use self::core::{Alias, Entity, Link, MergedEntity, MergedLink};
pub use judgement::{Judgement, JudgementRecord, PairKey, StoredJudgement};
pub use stats_models::{MatchMethodStats, MatchMethodType, PipelineStats};
