// src/models/stats_models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMethodType {
    Exact,
    Lexical,
    Learned,
}

impl MatchMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethodType::Exact => "exact",
            MatchMethodType::Lexical => "lexical",
            MatchMethodType::Learned => "learned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMethodStats {
    pub method_type: MatchMethodType,
    /// Judgements written by the pass (positive for exact, undecided for candidates).
    pub judgements_emitted: usize,
    pub entities_matched: usize,
    pub pairs_compared: usize,
    pub avg_score: f64,
    /// Set when the pass was skipped, e.g. for lack of training data.
    pub skipped_reason: Option<String>,
}

impl MatchMethodStats {
    pub fn skipped(method_type: MatchMethodType, reason: impl Into<String>) -> Self {
        Self {
            method_type,
            judgements_emitted: 0,
            entities_matched: 0,
            pairs_compared: 0,
            avg_score: 0.0,
            skipped_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub description: Option<String>,
    pub total_entities: usize,
    pub total_judgements: usize,
    pub total_clusters: usize,
    pub total_merged_entities: usize,
    pub total_merged_links: usize,
    pub matching_time: f64,
    pub clustering_time: f64,
    pub canonicalisation_time: f64,
    pub merge_time: f64,
    pub method_stats: Vec<MatchMethodStats>,
}

impl PipelineStats {
    pub fn new(run_id: String, run_timestamp: NaiveDateTime, description: Option<String>) -> Self {
        Self {
            run_id,
            run_timestamp,
            description,
            total_entities: 0,
            total_judgements: 0,
            total_clusters: 0,
            total_merged_entities: 0,
            total_merged_links: 0,
            matching_time: 0.0,
            clustering_time: 0.0,
            canonicalisation_time: 0.0,
            merge_time: 0.0,
            method_stats: Vec::new(),
        }
    }

    pub fn total_processing_time(&self) -> f64 {
        self.matching_time + self.clustering_time + self.canonicalisation_time + self.merge_time
    }
}
