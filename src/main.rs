use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::MultiProgress;
use log::info;
use std::time::Instant;

use dedupe_lib::matching::manager::{
    run_canonicalise, run_exact_merge, run_learned_candidates, run_lexical_candidates, run_merge,
    run_pipeline,
};
use dedupe_lib::store::PgProjectStore;
use dedupe_lib::utils::config::PipelineConfig;
use dedupe_lib::utils::db_connect::{connect, get_pool_status};
use dedupe_lib::utils::env::{load_env, load_env_from};
use dedupe_lib::utils::get_memory_usage;
use dedupe_lib::utils::origin_filter::{parse_origin_list, OriginFilterConfig};
use dedupe_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Entity deduplication: judgements, clusters and canonical ids", long_about = None)]
struct Cli {
    /// Env file to load before reading configuration
    #[arg(long, global = true)]
    env_file: Option<String>,

    /// Comma-separated origins to restrict matching to (overrides ALLOWED_ORIGINS)
    #[arg(long, global = true)]
    origins: Option<String>,

    /// Create the schema and tables if they are missing
    #[arg(long, global = true)]
    init_schema: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record positive judgements for entities sharing a normalized name
    ExactMerge,
    /// Generate undecided candidate judgements
    Candidates {
        #[arg(value_enum)]
        method: CandidateMethod,
        /// Minimum score (exclusive); defaults to the configured threshold
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Cluster positive judgements and write canonical ids
    Canonicalise,
    /// Rebuild the merged entity and link tables
    Merge,
    /// Run every phase in order
    Run {
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CandidateMethod {
    Lexical,
    Learned,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.env_file.as_deref() {
        Some(path) => load_env_from(Some(path)),
        None => load_env(),
    }
    info!("Starting entity deduplication");

    let mut config = PipelineConfig::from_env();
    let origin_filter = match &cli.origins {
        Some(raw) => OriginFilterConfig::from_origins(parse_origin_list(raw)),
        None => OriginFilterConfig::from_env(),
    };
    origin_filter.log_config();
    let progress_config = ProgressConfig::from_env();
    let multi_progress: Option<MultiProgress> = progress_config.create_multi_progress();

    let pool = connect().await.context("Failed to connect to database")?;
    let store = PgProjectStore::from_env(pool.clone()).context("Invalid PROJECT_SCHEMA")?;
    if cli.init_schema {
        store.ensure_tables().await.context("Failed to create pipeline tables")?;
    }
    info!("Using schema {}", store.schema());

    let start = Instant::now();
    match cli.command {
        Command::ExactMerge => {
            let outcome = run_exact_merge(&store, &origin_filter).await?;
            info!(
                "Exact merge: {} groups, {} new positive judgements, {} negative decisions kept",
                outcome.groups, outcome.pairs_emitted, outcome.conflicts_preserved
            );
        }
        Command::Candidates { method, threshold } => match method {
            CandidateMethod::Lexical => {
                if let Some(t) = threshold {
                    config.lexical.threshold = t;
                }
                config.log_config();
                let outcome =
                    run_lexical_candidates(&store, &config.lexical, &origin_filter, multi_progress.as_ref())
                        .await?;
                info!(
                    "Lexical candidates: {} above threshold, {} written",
                    outcome.candidates, outcome.written
                );
            }
            CandidateMethod::Learned => {
                if let Some(t) = threshold {
                    config.learned.threshold = t;
                }
                config.log_config();
                let outcome =
                    run_learned_candidates(&store, &config.learned, &origin_filter, multi_progress.as_ref())
                        .await?;
                info!(
                    "Learned candidates: {} above threshold, {} undecided replaced",
                    outcome.candidates, outcome.undecided_deleted
                );
            }
        },
        Command::Canonicalise => {
            let (clusters, summary) = run_canonicalise(&store).await?;
            info!(
                "Canonicalised {} clusters ({} rows assigned)",
                clusters.len(),
                summary.rows_assigned
            );
        }
        Command::Merge => {
            let summary = run_merge(&store).await?;
            info!(
                "Merged tables rebuilt: {} entities, {} links",
                summary.merged_entities, summary.merged_links
            );
        }
        Command::Run { description } => {
            config.log_config();
            let stats = run_pipeline(
                &store,
                &config,
                &origin_filter,
                multi_progress.as_ref(),
                description,
            )
            .await?;
            info!(
                "Run {} complete: {} clusters over {} entities",
                stats.run_id, stats.total_clusters, stats.total_entities
            );
        }
    }

    if progress_config.should_show_memory() {
        info!("Memory usage: {} MB", get_memory_usage().await);
    }
    let (size, idle, in_use) = get_pool_status(&pool);
    info!(
        "Finished in {:.2?} (DB pool: {} connections, {} idle, {} in use)",
        start.elapsed(),
        size,
        idle,
        in_use
    );
    Ok(())
}
