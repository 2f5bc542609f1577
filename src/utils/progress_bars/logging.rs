// src/utils/progress_bars/logging.rs - Method-tagged logging helpers for the matching passes
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::stats_models::{MatchMethodStats, MatchMethodType, PipelineStats};

fn method_label(method_type: &MatchMethodType) -> (&'static str, &'static str) {
    match method_type {
        MatchMethodType::Exact => ("EXACT", "🎯"),
        MatchMethodType::Lexical => ("LEXICAL", "🔤"),
        MatchMethodType::Learned => ("LEARNED", "🧠"),
    }
}

#[derive(Clone)]
pub struct MatchingLogger {
    method_key: &'static str,
    method_name: &'static str,
    method_emoji: &'static str,
    start_time: Instant,
}

impl MatchingLogger {
    pub fn new(method_type: MatchMethodType) -> Self {
        let (method_name, method_emoji) = method_label(&method_type);
        Self {
            method_key: method_type.as_str(),
            method_name,
            method_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, entity_count: usize) {
        info!(
            "[{}] {} 🚀 Starting {} matching over {} entities",
            self.method_name,
            self.method_emoji,
            self.method_key,
            entity_count
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.get_elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_existing_pairs(&self, count: usize) {
        if count > 0 {
            info!(
                "[{}] {} ⏭️  Found {} decided pairs (will skip)",
                self.method_name, self.method_emoji, count
            );
        } else {
            info!(
                "[{}] {} ✨ No decided pairs found - clean slate",
                self.method_name, self.method_emoji
            );
        }
    }

    pub fn log_group(&self, key: &str, member_count: usize) {
        info!(
            "[{}] {} 👥 Group '{}': {} entities",
            self.method_name, self.method_emoji, key, member_count
        );
    }

    pub fn log_candidate(&self, uid_a: &str, uid_b: &str, score: f64) {
        info!(
            "[{}] {} 🔗 Candidate ({}, {}) score {:.3}",
            self.method_name, self.method_emoji, uid_a, uid_b, score
        );
    }

    pub fn log_pair_generation(&self, total_pairs: usize, skipped_decided: usize) {
        info!(
            "[{}] {} 📈 Pairs to evaluate: {} ({} decided pairs skipped)",
            self.method_name, self.method_emoji, total_pairs, skipped_decided
        );
    }

    pub fn log_training(&self, positives: usize, negatives: usize, reused: bool) {
        info!(
            "[{}] {} 🏋️  Model {} on {} positive / {} negative examples",
            self.method_name,
            self.method_emoji,
            if reused { "reused" } else { "trained" },
            positives,
            negatives
        );
    }

    pub fn log_completion(&self, stats: &MatchMethodStats) {
        let duration = self.get_elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED: {} judgements emitted in {:.2?}",
            self.method_name, self.method_emoji, stats.judgements_emitted, duration
        );
        info!(
            "[{}] {} 📊 Results: {} entities matched, avg score: {:.3}, {} pairs compared",
            self.method_name,
            self.method_emoji,
            stats.entities_matched,
            stats.avg_score,
            stats.pairs_compared
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            "[{}] {} ⚠️  {}",
            self.method_name, self.method_emoji, message
        );
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.method_name, self.method_emoji, message);
    }

    pub fn get_elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

pub fn log_pipeline_start(run_id: &str, entity_count: usize, judgement_count: usize) {
    info!("🚀 ===== ENTITY DEDUPLICATION PIPELINE STARTING =====");
    info!("📅 Pipeline Run ID: {}", run_id);
    info!("   • {} entities in pool", entity_count);
    info!("   • {} judgements in ledger", judgement_count);
    info!("🎯 Passes: Exact 🎯, Learned 🧠, Lexical 🔤");
    info!("====================================================");
}

pub fn log_pipeline_phase(phase: &str, details: Option<&str>) {
    match details {
        Some(details) => info!("🔄 Pipeline Phase: {} - {}", phase, details),
        None => info!("🔄 Pipeline Phase: {}", phase),
    }
}

pub fn log_pipeline_completion(stats: &PipelineStats, memory_mb: Option<u64>) {
    info!("🎉 ===== ENTITY DEDUPLICATION PIPELINE COMPLETED =====");
    info!("📅 Pipeline Run ID: {}", stats.run_id);
    info!("⏱️  Total Duration: {:.2}s", stats.total_processing_time());
    info!("📈 Method Breakdown:");
    for method in &stats.method_stats {
        let (name, emoji) = method_label(&method.method_type);
        match &method.skipped_reason {
            Some(reason) => info!("  {} {}: skipped ({})", emoji, name, reason),
            None => info!(
                "  {} {}: {} judgements, {} entities (avg score: {:.3})",
                emoji, name, method.judgements_emitted, method.entities_matched, method.avg_score
            ),
        }
    }
    info!("📊 Summary:");
    info!("  • Entities: {}", stats.total_entities);
    info!("  • Judgements in ledger: {}", stats.total_judgements);
    info!("  • Clusters: {}", stats.total_clusters);
    info!(
        "  • Merged: {} entities, {} links",
        stats.total_merged_entities, stats.total_merged_links
    );
    info!(
        "  • Timings: matching {:.2}s, clustering {:.2}s, canonicalisation {:.2}s, merge {:.2}s",
        stats.matching_time, stats.clustering_time, stats.canonicalisation_time, stats.merge_time
    );
    if let Some(mb) = memory_mb {
        info!("  • Memory in use: {} MB", mb);
    }
    info!("====================================================");
}
