//! `larder embed rebuild`: regenerate the Vector Index from the Corpus.
//!
//! Every recipe is embedded before the index is touched. The old vectors
//! are replaced in one call only when all of them embedded, so an outage
//! of the embedding provider leaves the existing index in place.

use anyhow::{bail, Context, Result};

use larder_core::embedding::Embedder;
use larder_core::ingest::{embed_records, IndexWrite};
use larder_core::store::{load_recipes, Corpus, VectorIndex};

use crate::config::Config;
use crate::embedding::create_enabled_provider;
use crate::sqlite_store::Stores;

/// Embed every Corpus recipe, then replace the index with the result.
pub async fn rebuild_index(
    corpus: &dyn Corpus,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<(u64, IndexWrite)> {
    let ids = corpus.ids().await?;
    let recipes = load_recipes(corpus, &ids).await?;
    let embedded = embed_records(embedder, &recipes, batch_size).await;
    if embedded.failed > 0 {
        bail!(
            "{} of {} recipes failed to embed with {}; vector index left unchanged",
            embedded.failed,
            recipes.len(),
            embedder.model_name()
        );
    }

    index
        .replace_all(&embedded.records)
        .await
        .with_context(|| format!("vector index rebuild failed ({} records)", embedded.records.len()))?;
    Ok((
        ids.len() as u64,
        IndexWrite {
            written: embedded.records.len(),
            embed_failed: 0,
        },
    ))
}

pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    let embedder = create_enabled_provider(&config.embedding)?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size).max(1);
    let stores = Stores::open(config, embedder.model_name()).await?;

    let result = rebuild_index(&stores.corpus, &stores.index, embedder.as_ref(), batch_size).await;
    stores.close().await;
    let (total, written) = result?;

    println!("embed rebuild");
    println!("  model: {}", embedder.model_name());
    println!("  total recipes: {}", total);
    println!("  embedded: {}", written.written);
    Ok(())
}
