//! Ingestion pipeline: providers → normalization → Corpus → Vector Index.
//!
//! The dual-write is a two-phase, best-effort sequence with no rollback
//! coupling between the phases:
//!
//! 1. Every normalized recipe is upserted into the [`Corpus`] one row at a
//!    time. A failed row is logged, counted and skipped.
//! 2. Every normalized recipe (whether or not its corpus write succeeded) is
//!    embedded and written to the [`VectorIndex`] in a single batched call.
//!    That call is all-or-nothing and its failure fails the ingest.
//!
//! The Corpus is first-write-wins, so a recipe it already held is indexed
//! from the stored row rather than the fresh payload. Filter metadata and
//! the allergen document always describe what the Corpus returns.
//!
//! A crash between the phases leaves corpus rows without vectors, which the
//! [auditor](crate::audit) reports. The counts in [`IngestReport`] may
//! legitimately diverge.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::{embedding_text, vector_record};
use crate::embedding::Embedder;
use crate::models::{Goal, Recipe, VectorRecord};
use crate::normalize::normalize;
use crate::source::RecipeSource;
use crate::store::{load_recipes, Corpus, UpsertOutcome, VectorIndex};

/// Inputs for one ingest invocation.
#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    pub goal: Goal,
    pub cuisine: Option<&'a str>,
    /// Total number of recipes requested across all providers.
    pub limit: usize,
    /// Texts per embedding call.
    pub embed_batch_size: usize,
}

/// Per-phase counts for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Raw payloads returned by providers.
    pub fetched: usize,
    /// Payloads that normalized into a distinct recipe.
    pub normalized: usize,
    /// Payloads rejected by normalization or duplicated within the batch.
    pub skipped: usize,
    pub corpus_inserted: usize,
    pub corpus_refreshed: usize,
    pub corpus_failed: usize,
    /// Recipes left out of the index batch because embedding failed.
    pub embed_failed: usize,
    pub index_written: usize,
}

impl IngestReport {
    pub fn corpus_written(&self) -> usize {
        self.corpus_inserted + self.corpus_refreshed
    }
}

/// Run the full pipeline for one request.
pub async fn ingest<C, V, E>(
    sources: &[Box<dyn RecipeSource>],
    corpus: &C,
    index: &V,
    embedder: &E,
    req: &IngestRequest<'_>,
) -> Result<IngestReport>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    let raws = fetch_all(sources, req.goal, req.cuisine, req.limit).await;
    let fetched = raws.len();
    let (mut recipes, skipped) = normalize_all(&raws);
    recipes.truncate(req.limit);

    let mut report = ingest_recipes(corpus, index, embedder, &recipes, req.embed_batch_size).await?;
    report.fetched = fetched;
    report.skipped = skipped;

    info!(
        goal = %req.goal,
        cuisine = req.cuisine.unwrap_or("all"),
        fetched = report.fetched,
        corpus_written = report.corpus_written(),
        index_written = report.index_written,
        "ingest finished"
    );
    Ok(report)
}

/// Write already-normalized recipes through both phases.
pub async fn ingest_recipes<C, V, E>(
    corpus: &C,
    index: &V,
    embedder: &E,
    recipes: &[Recipe],
    embed_batch_size: usize,
) -> Result<IngestReport>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    let mut report = IngestReport {
        fetched: recipes.len(),
        normalized: recipes.len(),
        ..Default::default()
    };

    let written = write_corpus(corpus, recipes).await;
    report.corpus_inserted = written.inserted;
    report.corpus_refreshed = written.refreshed.len();
    report.corpus_failed = written.failed;

    let to_index = index_content(corpus, recipes, &written.refreshed).await;
    let indexed = write_index(index, embedder, &to_index, embed_batch_size).await?;
    report.index_written = indexed.written;
    report.embed_failed = indexed.embed_failed;

    Ok(report)
}

/// Fetch from every provider. A failing provider contributes nothing.
///
/// The requested `limit` is split evenly across providers.
pub async fn fetch_all(
    sources: &[Box<dyn RecipeSource>],
    goal: Goal,
    cuisine: Option<&str>,
    limit: usize,
) -> Vec<Value> {
    if sources.is_empty() || limit == 0 {
        return Vec::new();
    }
    let per_source = limit.div_ceil(sources.len());
    let mut raws = Vec::new();
    for source in sources {
        match source.fetch(goal, cuisine, per_source).await {
            Ok(items) => {
                debug!(provider = source.name(), count = items.len(), "provider fetch ok");
                raws.extend(items);
            }
            Err(e) => {
                warn!(provider = source.name(), error = %e, "provider fetch failed; skipping");
            }
        }
    }
    raws
}

/// Normalize raw payloads, dropping malformed items and in-batch duplicates.
///
/// Returns the recipes (first occurrence wins) and the number skipped.
pub fn normalize_all(raws: &[Value]) -> (Vec<Recipe>, usize) {
    let mut seen = HashSet::new();
    let mut recipes = Vec::with_capacity(raws.len());
    let mut skipped = 0;
    for (i, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(recipe) => {
                if seen.insert(recipe.id.clone()) {
                    recipes.push(recipe);
                } else {
                    debug!(recipe_id = %recipe.id, "duplicate recipe in batch; skipping");
                    skipped += 1;
                }
            }
            Err(e) => {
                warn!(position = i, error = %e, "could not normalize recipe; skipping");
                skipped += 1;
            }
        }
    }
    (recipes, skipped)
}

#[derive(Debug, Default)]
struct CorpusWrite {
    inserted: usize,
    /// Ids the Corpus already held; their stored content was kept.
    refreshed: Vec<String>,
    failed: usize,
}

async fn write_corpus<C: Corpus + ?Sized>(corpus: &C, recipes: &[Recipe]) -> CorpusWrite {
    let mut out = CorpusWrite::default();
    for recipe in recipes {
        match corpus.upsert(recipe).await {
            Ok(UpsertOutcome::Inserted) => out.inserted += 1,
            Ok(UpsertOutcome::Refreshed) => out.refreshed.push(recipe.id.clone()),
            Err(e) => {
                warn!(recipe_id = %recipe.id, error = %e, "corpus write failed; skipping");
                out.failed += 1;
            }
        }
    }
    out
}

/// The recipes to index: fresh payloads for new or failed Corpus writes,
/// stored rows for refreshed ids.
///
/// A refreshed recipe whose stored row cannot be read is left out of the
/// batch; indexing the fresh payload would let it disagree with the Corpus.
async fn index_content<C: Corpus + ?Sized>(
    corpus: &C,
    recipes: &[Recipe],
    refreshed: &[String],
) -> Vec<Recipe> {
    if refreshed.is_empty() {
        return recipes.to_vec();
    }
    let mut stored: HashMap<String, Recipe> = match load_recipes(corpus, refreshed).await {
        Ok(rows) => rows.into_iter().map(|r| (r.id.clone(), r)).collect(),
        Err(e) => {
            warn!(count = refreshed.len(), error = %e, "could not read stored recipes; not re-indexing them");
            HashMap::new()
        }
    };
    let refreshed: HashSet<&str> = refreshed.iter().map(String::as_str).collect();

    recipes
        .iter()
        .filter_map(|recipe| {
            if !refreshed.contains(recipe.id.as_str()) {
                return Some(recipe.clone());
            }
            let row = stored.remove(&recipe.id);
            if row.is_none() {
                debug!(recipe_id = %recipe.id, "stored recipe unavailable; skipping index write");
            }
            row
        })
        .collect()
}

/// Vectors ready for an index write.
#[derive(Debug, Default)]
pub struct Embedded {
    pub records: Vec<VectorRecord>,
    /// Recipes left out because their embedding failed.
    pub failed: usize,
}

/// Embed `recipes` in sub-batches of `batch_size`.
///
/// A failed sub-batch, a short response or a vector of the wrong
/// dimensionality is logged and counted; the rest still embed.
pub async fn embed_records<E: Embedder + ?Sized>(
    embedder: &E,
    recipes: &[Recipe],
    batch_size: usize,
) -> Embedded {
    let mut out = Embedded {
        records: Vec::with_capacity(recipes.len()),
        failed: 0,
    };
    let dims = embedder.dims();

    for batch in recipes.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(embedding_text).collect();
        let vectors = match embedder.embed(&texts).await {
            Ok(v) if v.len() == batch.len() => v,
            Ok(v) => {
                warn!(
                    model = embedder.model_name(),
                    expected = batch.len(),
                    got = v.len(),
                    "embedding count mismatch; skipping batch"
                );
                out.failed += batch.len();
                continue;
            }
            Err(e) => {
                warn!(model = embedder.model_name(), error = %e, "embedding batch failed; skipping");
                out.failed += batch.len();
                continue;
            }
        };

        for ((recipe, text), vector) in batch.iter().zip(texts).zip(vectors) {
            if vector.len() != dims {
                warn!(
                    recipe_id = %recipe.id,
                    expected = dims,
                    got = vector.len(),
                    "embedding has wrong dimensionality; skipping"
                );
                out.failed += 1;
                continue;
            }
            out.records.push(vector_record(recipe, text, vector));
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct IndexWrite {
    pub written: usize,
    pub embed_failed: usize,
}

/// Embed `recipes` and write them to the index in a single batch call.
///
/// Embedding failures are counted and left out (see [`embed_records`]).
/// The index call is all-or-nothing and its error is returned to the caller.
pub async fn write_index<V, E>(
    index: &V,
    embedder: &E,
    recipes: &[Recipe],
    batch_size: usize,
) -> Result<IndexWrite>
where
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    let embedded = embed_records(embedder, recipes, batch_size).await;
    let mut out = IndexWrite {
        written: 0,
        embed_failed: embedded.failed,
    };
    let records = embedded.records;
    if records.is_empty() {
        return Ok(out);
    }

    index
        .upsert_batch(&records)
        .await
        .with_context(|| format!("vector index batch write failed ({} records)", records.len()))?;
    out.written = records.len();
    Ok(out)
}
