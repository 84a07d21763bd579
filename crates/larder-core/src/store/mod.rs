//! Storage abstraction for Larder.
//!
//! Two independent stores back the system:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`Corpus`] | Relational source of truth holding full recipe records |
//! | [`VectorIndex`] | Nearest-neighbour index of embeddings + filter metadata |
//!
//! There is no transaction spanning both. Writers go Corpus first, index
//! second; readers go index first, Corpus second. A vector whose id is
//! missing from the Corpus is excluded at read time and surfaced only by
//! the [auditor](crate::audit).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{MetadataFilter, Recipe, RecipeMetadata, VectorRecord};

/// Result of a Corpus upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// New row written with the supplied content.
    Inserted,
    /// Row already existed; only `last_seen_at` was touched.
    Refreshed,
}

/// A ranked hit returned by [`VectorIndex::query`].
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub metadata: RecipeMetadata,
    pub document: String,
    /// Cosine similarity to the query vector (higher is closer).
    pub score: f32,
}

/// Authoritative relational recipe store.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Insert a recipe, or refresh `last_seen_at` if the id already exists.
    ///
    /// Content is first-write-wins: a reimport never overwrites name,
    /// nutrition, ingredients, or any other content field.
    async fn upsert(&self, recipe: &Recipe) -> Result<UpsertOutcome>;

    /// Batched lookup. Unknown ids are absent from the output; order is
    /// unspecified.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Recipe>>;

    async fn get(&self, id: &str) -> Result<Option<Recipe>>;

    async fn count(&self) -> Result<u64>;

    /// All recipe ids, sorted ascending.
    async fn ids(&self) -> Result<Vec<String>>;

    /// Increment the popularity counter. Returns `false` for unknown ids.
    async fn increment_popularity(&self, id: &str) -> Result<bool>;
}

/// Nearest-neighbour index over recipe embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert all records in one call. All-or-nothing: on error none of
    /// the batch is visible.
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `k` records ordered by decreasing similarity, keeping
    /// only those whose metadata satisfies `filter`.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>>;

    async fn count(&self) -> Result<u64>;

    /// All indexed ids, sorted ascending.
    async fn ids(&self) -> Result<Vec<String>>;

    async fn delete_all(&self) -> Result<()>;

    /// Replace the whole index with `records`.
    ///
    /// Stores that can should do this in one transaction; the default
    /// clears first and then writes.
    async fn replace_all(&self, records: &[VectorRecord]) -> Result<()> {
        self.delete_all().await?;
        if records.is_empty() {
            return Ok(());
        }
        self.upsert_batch(records).await
    }
}

/// Ids resolved per [`Corpus::get_by_ids`] call by [`load_recipes`].
pub const LOOKUP_CHUNK: usize = 500;

/// Resolve `ids` against the Corpus in bounded batches.
///
/// Output follows the order of `ids`; unknown ids are absent.
pub async fn load_recipes<C: Corpus + ?Sized>(corpus: &C, ids: &[String]) -> Result<Vec<Recipe>> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let mut by_id: HashMap<String, Recipe> = corpus
            .get_by_ids(chunk)
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        out.extend(chunk.iter().filter_map(|id| by_id.remove(id)));
    }
    Ok(out)
}

/// Orders hits by descending score, ties broken by id for determinism.
pub fn rank_hits(hits: &mut Vec<VectorHit>, k: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
}
