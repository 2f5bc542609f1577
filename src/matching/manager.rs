// src/matching/manager.rs - Runs the passes in order against a ProjectStore
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use indicatif::MultiProgress;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use super::exact::{exact_merge, ExactMergeOutcome};
use super::learned::{apply_learned_model, build_feature_records, collect_training_examples};
use super::lexical::generate_candidates_lexical_with_progress;
use super::CandidateOutcome;
use crate::canonical::{canonicalise, default_updates, CanonicalMap, CanonicalisationSummary};
use crate::clustering::{compute_clusters, Cluster};
use crate::error::ResolveError;
use crate::ledger::JudgementLedger;
use crate::merge::{merge_entities, merge_links};
use crate::models::stats_models::{MatchMethodStats, MatchMethodType, PipelineStats};
use crate::models::Entity;
use crate::rl::pairwise_scorer::check_class_balance;
use crate::rl::{training_signature, LogisticPairScorer, OnlineLogisticRegression, PairwiseScorer};
use crate::store::ProjectStore;
use crate::utils::config::{LearnedConfig, LexicalConfig, PipelineConfig, TrainingConfig};
use crate::utils::get_memory_usage;
use crate::utils::origin_filter::OriginFilterConfig;
use crate::utils::progress_bars::logging::{
    log_pipeline_completion, log_pipeline_phase, log_pipeline_start, MatchingLogger,
};

pub const MODEL_NAME: &str = "pairwise_logistic";

/// What `save_model` persists for the learned pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModel {
    pub signature: String,
    pub training: TrainingConfig,
    pub positives: usize,
    pub negatives: usize,
    pub trained_at: NaiveDateTime,
    pub model: OnlineLogisticRegression,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged_entities: usize,
    pub merged_links: usize,
}

fn is_insufficient_training_data(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ResolveError>(),
        Some(ResolveError::InsufficientTrainingData { .. })
    )
}

async fn load_pool<S: ProjectStore>(store: &S, origin_filter: &OriginFilterConfig) -> Result<Vec<Entity>> {
    let entities = store
        .entities(origin_filter.origins())
        .await
        .context("Failed to load entities")?;
    origin_filter.validate_origins(&entities);
    Ok(entities)
}

/// Exact-name pass: load, match, flush.
pub async fn run_exact_merge<S: ProjectStore>(
    store: &S,
    origin_filter: &OriginFilterConfig,
) -> Result<ExactMergeOutcome> {
    let entities = load_pool(store, origin_filter).await?;
    let mut ledger = JudgementLedger::load(store).await?;
    let outcome = exact_merge(&entities, origin_filter, &mut ledger)?;
    ledger.flush(store).await?;
    Ok(outcome)
}

pub async fn run_lexical_candidates<S: ProjectStore>(
    store: &S,
    config: &LexicalConfig,
    origin_filter: &OriginFilterConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<CandidateOutcome> {
    let entities = load_pool(store, origin_filter).await?;
    let mut ledger = JudgementLedger::load(store).await?;
    let outcome = generate_candidates_lexical_with_progress(&entities, config, &mut ledger, multi_progress)?;
    ledger.flush(store).await?;
    Ok(outcome)
}

pub async fn run_learned_candidates<S: ProjectStore>(
    store: &S,
    config: &LearnedConfig,
    origin_filter: &OriginFilterConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<CandidateOutcome> {
    let entities = load_pool(store, origin_filter).await?;
    let mut ledger = JudgementLedger::load(store).await?;
    let outcome = learned_pass(store, &entities, &mut ledger, config, multi_progress).await?;
    ledger.flush(store).await?;
    Ok(outcome)
}

/// Trains (or reuses) the classifier and regenerates learned candidates in
/// `ledger`. Nothing in the ledger changes when training data is insufficient.
pub async fn learned_pass<S: ProjectStore>(
    store: &S,
    entities: &[Entity],
    ledger: &mut JudgementLedger,
    config: &LearnedConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<CandidateOutcome> {
    let logger = MatchingLogger::new(MatchMethodType::Learned);
    let records = build_feature_records(entities);
    let examples = collect_training_examples(&records, ledger);
    let (positives, negatives) =
        check_class_balance(&examples, config.training.min_examples_per_class)?;
    let scorer = LogisticPairScorer::new(config.training.clone());
    let signature = training_signature(&examples);

    let reusable = if config.reuse_model {
        match store.load_model(MODEL_NAME).await? {
            Some(json) => match serde_json::from_value::<StoredModel>(json) {
                Ok(stored) if stored.signature == signature && stored.training == config.training => {
                    Some(stored.model)
                }
                Ok(_) => {
                    debug!("Stored model is stale; retraining");
                    None
                }
                Err(e) => {
                    logger.log_warning(&format!("Ignoring unreadable stored model: {}", e));
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    let model = match reusable {
        Some(model) => {
            logger.log_training(positives, negatives, true);
            model
        }
        None => {
            let model = scorer.train(&examples)?;
            logger.log_training(positives, negatives, false);
            let stored = StoredModel {
                signature,
                training: config.training.clone(),
                positives,
                negatives,
                trained_at: Utc::now().naive_utc(),
                model,
            };
            let json = serde_json::to_value(&stored).context("Failed to serialize trained model")?;
            store
                .save_model(MODEL_NAME, &json)
                .await
                .context("Failed to save trained model")?;
            stored.model
        }
    };

    Ok(apply_learned_model(
        &records,
        &scorer,
        &model,
        config.threshold,
        ledger,
        multi_progress,
    )?)
}

/// Clusters from the stored ledger, written through to every dependent table.
pub async fn run_canonicalise<S: ProjectStore>(store: &S) -> Result<(Vec<Cluster>, CanonicalisationSummary)> {
    let ledger = JudgementLedger::load(store).await?;
    let clusters = compute_clusters(&ledger);
    let summary = canonicalise(store, &clusters, &default_updates()).await?;
    Ok((clusters, summary))
}

/// Rebuilds the merged entity and link tables from the stored ledger.
pub async fn run_merge<S: ProjectStore>(store: &S) -> Result<MergeSummary> {
    let ledger = JudgementLedger::load(store).await?;
    let clusters = compute_clusters(&ledger);
    merge_with_clusters(store, &clusters).await
}

async fn merge_with_clusters<S: ProjectStore>(store: &S, clusters: &[Cluster]) -> Result<MergeSummary> {
    let canonical_map = CanonicalMap::from_clusters(clusters);
    let entities = store.entities(&[]).await.context("Failed to load entities for merge")?;
    let links = store.links().await.context("Failed to load links for merge")?;

    let merged_entities = merge_entities(&entities, &canonical_map);
    let merged_links = merge_links(&links, &canonical_map);
    store
        .replace_merged(&merged_entities, &merged_links)
        .await
        .context("Failed to write merged tables")?;
    Ok(MergeSummary {
        merged_entities: merged_entities.len(),
        merged_links: merged_links.len(),
    })
}

/// Full run: exact, learned and lexical passes, then clustering,
/// canonicalisation and merge. Each pass is flushed before the next starts.
pub async fn run_pipeline<S: ProjectStore>(
    store: &S,
    config: &PipelineConfig,
    origin_filter: &OriginFilterConfig,
    multi_progress: Option<&MultiProgress>,
    description: Option<String>,
) -> Result<PipelineStats> {
    let run_id = Uuid::new_v4().to_string();
    let mut stats = PipelineStats::new(run_id.clone(), Utc::now().naive_utc(), description);

    let entities = load_pool(store, origin_filter).await?;
    let mut ledger = JudgementLedger::load(store).await?;
    stats.total_entities = entities.len();
    log_pipeline_start(&run_id, entities.len(), ledger.len());

    let matching_start = Instant::now();
    log_pipeline_phase("Exact matching", None);
    let exact = exact_merge(&entities, origin_filter, &mut ledger)?;
    ledger.flush(store).await?;
    stats.method_stats.push(exact.to_stats());

    log_pipeline_phase("Learned candidates", None);
    match learned_pass(store, &entities, &mut ledger, &config.learned, multi_progress).await {
        Ok(outcome) => {
            ledger.flush(store).await?;
            stats.method_stats.push(outcome.to_stats());
        }
        Err(e) if is_insufficient_training_data(&e) => {
            warn!("Skipping learned candidates: {}", e);
            stats
                .method_stats
                .push(MatchMethodStats::skipped(MatchMethodType::Learned, e.to_string()));
        }
        Err(e) => return Err(e.context("Learned candidate pass failed")),
    }

    // After the learned pass, which clears every undecided judgement.
    log_pipeline_phase("Lexical candidates", None);
    let lexical =
        generate_candidates_lexical_with_progress(&entities, &config.lexical, &mut ledger, multi_progress)?;
    ledger.flush(store).await?;
    stats.method_stats.push(lexical.to_stats());
    stats.matching_time = matching_start.elapsed().as_secs_f64();
    stats.total_judgements = ledger.len();

    let clustering_start = Instant::now();
    log_pipeline_phase("Clustering", None);
    let clusters = compute_clusters(&ledger);
    stats.total_clusters = clusters.len();
    stats.clustering_time = clustering_start.elapsed().as_secs_f64();

    let canonical_start = Instant::now();
    log_pipeline_phase("Canonicalisation", Some(&format!("{} clusters", clusters.len())));
    canonicalise(store, &clusters, &default_updates()).await?;
    stats.canonicalisation_time = canonical_start.elapsed().as_secs_f64();

    let merge_start = Instant::now();
    log_pipeline_phase("Merge", None);
    let merged = merge_with_clusters(store, &clusters).await?;
    stats.total_merged_entities = merged.merged_entities;
    stats.total_merged_links = merged.merged_links;
    stats.merge_time = merge_start.elapsed().as_secs_f64();

    let memory_mb = if multi_progress.is_some() {
        Some(get_memory_usage().await)
    } else {
        None
    };
    log_pipeline_completion(&stats, memory_mb);
    info!("Pipeline run {} finished", run_id);
    Ok(stats)
}
