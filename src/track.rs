//! `larder track`: record that recipes were used.

use anyhow::Result;

use larder_core::store::Corpus;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteCorpus;

/// Increment `popularity_score` for each id. Unknown ids are reported and
/// skipped. Returns the number of recipes updated.
pub async fn track_usage(corpus: &dyn Corpus, ids: &[String]) -> Result<usize> {
    let mut updated = 0;
    for id in ids {
        if corpus.increment_popularity(id).await? {
            updated += 1;
        } else {
            eprintln!("Warning: recipe not found: {}", id);
        }
    }
    Ok(updated)
}

pub async fn run_track(config: &Config, ids: &[String]) -> Result<()> {
    let pool = db::connect(&config.corpus.path).await?;
    let corpus = SqliteCorpus::new(pool.clone());
    let result = track_usage(&corpus, ids).await;
    pool.close().await;
    let updated = result?;

    println!("track");
    println!("  updated: {} / {}", updated, ids.len());
    Ok(())
}
