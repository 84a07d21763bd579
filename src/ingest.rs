//! `larder ingest` and `larder seed`.
//!
//! Wires configured providers, the SQLite stores, and the embedding
//! provider into [`larder_core::ingest`].

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::{info, warn};

use larder_core::embedding::Embedder;
use larder_core::ingest::{ingest, IngestReport, IngestRequest};
use larder_core::models::Goal;
use larder_core::source::RecipeSource;

use crate::config::Config;
use crate::embedding::create_enabled_provider;
use crate::sources::build_sources;
use crate::sqlite_store::Stores;

pub async fn run_ingest(
    config: &Config,
    goal: Goal,
    cuisine: Option<String>,
    limit: usize,
) -> Result<()> {
    if limit == 0 {
        bail!("--limit must be at least 1");
    }
    let sources = require_sources(config)?;
    let embedder = create_enabled_provider(&config.embedding)?;
    let stores = Stores::open(config, embedder.model_name()).await?;

    let request = IngestRequest {
        goal,
        cuisine: cuisine.as_deref(),
        limit,
        embed_batch_size: config.embedding.batch_size,
    };
    let result = ingest(&sources, &stores.corpus, &stores.index, &embedder, &request).await;
    stores.close().await;
    let report = result?;

    println!("ingest {}", goal);
    print_report(&report);
    println!("ok");
    Ok(())
}

/// Ingest every goal × configured cuisine, plus one pass with no cuisine.
///
/// Duplicates across passes collapse through the Corpus upsert.
pub async fn run_seed(config: &Config) -> Result<()> {
    let sources = require_sources(config)?;
    let embedder = create_enabled_provider(&config.embedding)?;
    let stores = Stores::open(config, embedder.model_name()).await?;

    let result = seed_all(config, &sources, &stores, embedder.as_ref()).await;
    stores.close().await;
    let totals = result?;

    println!("seed");
    print_report(&totals);
    println!("ok");
    Ok(())
}

async fn seed_all(
    config: &Config,
    sources: &[Box<dyn RecipeSource>],
    stores: &Stores,
    embedder: &dyn Embedder,
) -> Result<IngestReport> {
    let mut cuisines: Vec<Option<&str>> =
        config.seed.cuisines.iter().map(|c| Some(c.as_str())).collect();
    cuisines.push(None);

    let pause = Duration::from_millis(config.seed.pause_ms);
    let mut totals = IngestReport::default();
    let mut first = true;

    for goal in Goal::ALL {
        for cuisine in &cuisines {
            if !first && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            first = false;

            let request = IngestRequest {
                goal,
                cuisine: *cuisine,
                limit: config.seed.per_request_limit,
                embed_batch_size: config.embedding.batch_size,
            };
            match ingest(sources, &stores.corpus, &stores.index, embedder, &request).await {
                Ok(report) => {
                    info!(
                        goal = %goal,
                        cuisine = cuisine.unwrap_or("all"),
                        corpus_inserted = report.corpus_inserted,
                        "seed pass done"
                    );
                    accumulate(&mut totals, &report);
                }
                Err(e) => warn!(
                    goal = %goal,
                    cuisine = cuisine.unwrap_or("all"),
                    error = %e,
                    "seed pass failed; continuing"
                ),
            }
        }
    }

    Ok(totals)
}

fn require_sources(config: &Config) -> Result<Vec<Box<dyn RecipeSource>>> {
    let sources = build_sources(config);
    if sources.is_empty() {
        bail!("No recipe providers available. Configure [providers.*] and set their credentials (see `larder sources`).");
    }
    Ok(sources)
}

fn accumulate(totals: &mut IngestReport, r: &IngestReport) {
    totals.fetched += r.fetched;
    totals.normalized += r.normalized;
    totals.skipped += r.skipped;
    totals.corpus_inserted += r.corpus_inserted;
    totals.corpus_refreshed += r.corpus_refreshed;
    totals.corpus_failed += r.corpus_failed;
    totals.embed_failed += r.embed_failed;
    totals.index_written += r.index_written;
}

fn print_report(r: &IngestReport) {
    println!("  fetched: {}", r.fetched);
    println!("  normalized: {} ({} skipped)", r.normalized, r.skipped);
    println!(
        "  corpus written: {} ({} new, {} refreshed, {} failed)",
        r.corpus_written(),
        r.corpus_inserted,
        r.corpus_refreshed,
        r.corpus_failed
    );
    println!("  index written: {}", r.index_written);
    if r.embed_failed > 0 {
        println!("  embedding failures: {}", r.embed_failed);
    }
}
