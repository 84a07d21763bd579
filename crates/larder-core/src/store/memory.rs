//! In-memory [`Corpus`] and [`VectorIndex`] implementations for tests.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored vectors.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{MetadataFilter, Recipe, VectorRecord};

use super::{rank_hits, Corpus, UpsertOutcome, VectorHit, VectorIndex};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

/// In-memory relational store.
pub struct InMemoryCorpus {
    recipes: RwLock<BTreeMap<String, Recipe>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self {
            recipes: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryCorpus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Corpus for InMemoryCorpus {
    async fn upsert(&self, recipe: &Recipe) -> Result<UpsertOutcome> {
        let now = chrono::Utc::now().timestamp();
        let mut recipes = self.recipes.write().map_err(poisoned)?;
        match recipes.get_mut(&recipe.id) {
            Some(existing) => {
                existing.last_seen_at = existing.last_seen_at.max(now);
                Ok(UpsertOutcome::Refreshed)
            }
            None => {
                let mut stored = recipe.clone();
                stored.popularity_score = 0;
                stored.created_at = now;
                stored.last_seen_at = now;
                recipes.insert(recipe.id.clone(), stored);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Recipe>> {
        let recipes = self.recipes.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| recipes.get(id).cloned()).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Recipe>> {
        let recipes = self.recipes.read().map_err(poisoned)?;
        Ok(recipes.get(id).cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.recipes.read().map_err(poisoned)?.len() as u64)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        Ok(self.recipes.read().map_err(poisoned)?.keys().cloned().collect())
    }

    async fn increment_popularity(&self, id: &str) -> Result<bool> {
        let mut recipes = self.recipes.write().map_err(poisoned)?;
        Ok(match recipes.get_mut(id) {
            Some(r) => {
                r.popularity_score += 1;
                true
            }
            None => false,
        })
    }
}

/// In-memory vector index.
pub struct InMemoryVectorIndex {
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<()> {
        // Validate the whole batch before touching the map.
        if let Some(first) = records.first() {
            let dims = first.embedding.len();
            if dims == 0 {
                bail!("empty embedding for {}", first.id);
            }
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != dims) {
                bail!(
                    "embedding dimension mismatch for {}: expected {}, got {}",
                    bad.id,
                    dims,
                    bad.embedding.len()
                );
            }
        }
        let mut stored = self.records.write().map_err(poisoned)?;
        for r in records {
            stored.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        let stored = self.records.read().map_err(poisoned)?;
        if let Some(r) = stored.values().find(|r| r.embedding.len() != embedding.len()) {
            bail!(
                "query embedding has {} dims but {} was indexed with {}",
                embedding.len(),
                r.id,
                r.embedding.len()
            );
        }
        let mut hits: Vec<VectorHit> = stored
            .values()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| VectorHit {
                id: r.id.clone(),
                metadata: r.metadata.clone(),
                document: r.document.clone(),
                score: cosine_similarity(embedding, &r.embedding),
            })
            .collect();
        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().map_err(poisoned)?.len() as u64)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        Ok(self.records.read().map_err(poisoned)?.keys().cloned().collect())
    }

    async fn delete_all(&self) -> Result<()> {
        self.records.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn replace_all(&self, records: &[VectorRecord]) -> Result<()> {
        let fresh = InMemoryVectorIndex::new();
        fresh.upsert_batch(records).await?;
        let fresh = fresh.records.into_inner().map_err(poisoned)?;
        *self.records.write().map_err(poisoned)? = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Goal, Nutrition, RecipeMetadata};

    fn recipe(id: &str, name: &str, calories: f64) -> Recipe {
        Recipe {
            id: id.into(),
            name: name.into(),
            source: "test".into(),
            cuisine: "General".into(),
            description: String::new(),
            ingredients: vec![],
            instructions: String::new(),
            nutrition: Nutrition::new(calories, 10.0, 10.0, 10.0),
            tags: Default::default(),
            popularity_score: 0,
            created_at: 0,
            last_seen_at: 0,
        }
    }

    fn record(id: &str, embedding: Vec<f32>, calories: f64) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            embedding,
            metadata: RecipeMetadata::from(&recipe(id, id, calories)),
            document: format!("doc {}", id),
        }
    }

    #[tokio::test]
    async fn corpus_upsert_is_first_write_wins() {
        let corpus = InMemoryCorpus::new();
        assert_eq!(
            corpus.upsert(&recipe("a", "Original", 100.0)).await.unwrap(),
            UpsertOutcome::Inserted
        );
        let first = corpus.get("a").await.unwrap().unwrap();

        assert_eq!(
            corpus.upsert(&recipe("a", "Changed", 900.0)).await.unwrap(),
            UpsertOutcome::Refreshed
        );
        let second = corpus.get("a").await.unwrap().unwrap();
        assert_eq!(second.name, "Original");
        assert_eq!(second.nutrition.calories, 100.0);
        assert!(second.last_seen_at >= first.last_seen_at);
        assert_eq!(corpus.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn corpus_get_by_ids_skips_unknown() {
        let corpus = InMemoryCorpus::new();
        corpus.upsert(&recipe("a", "A", 1.0)).await.unwrap();
        let got = corpus
            .get_by_ids(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "a");
    }

    #[tokio::test]
    async fn corpus_popularity_increments() {
        let corpus = InMemoryCorpus::new();
        corpus.upsert(&recipe("a", "A", 1.0)).await.unwrap();
        assert!(corpus.increment_popularity("a").await.unwrap());
        assert!(corpus.increment_popularity("a").await.unwrap());
        assert!(!corpus.increment_popularity("b").await.unwrap());
        assert_eq!(corpus.get("a").await.unwrap().unwrap().popularity_score, 2);
    }

    #[tokio::test]
    async fn index_query_ranks_and_filters() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert_batch(&[
                record("near", vec![1.0, 0.1], 300.0),
                record("far", vec![0.0, 1.0], 300.0),
                record("heavy", vec![1.0, 0.0], 900.0),
            ])
            .await
            .unwrap();

        let all = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(all[0].id, "heavy");
        assert_eq!(all.len(), 3);

        let filter = Goal::ReduceIntake.metadata_filter();
        let filtered = index.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        let ids: Vec<&str> = filtered.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);

        let top1 = index.query(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn index_batch_rejects_mixed_dimensions_atomically() {
        let index = InMemoryVectorIndex::new();
        let err = index
            .upsert_batch(&[record("a", vec![1.0, 0.0], 1.0), record("b", vec![1.0], 1.0)])
            .await;
        assert!(err.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn index_delete_all_empties() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert_batch(&[record("a", vec![1.0], 1.0)])
            .await
            .unwrap();
        index.delete_all().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_query_rejects_wrong_dimensions() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert_batch(&[record("a", vec![1.0, 0.0], 1.0)])
            .await
            .unwrap();
        assert!(index.query(&[1.0, 0.0, 0.0], 5, None).await.is_err());
    }

    #[tokio::test]
    async fn index_replace_all_swaps_contents_or_keeps_old() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert_batch(&[record("old", vec![1.0, 0.0], 1.0)])
            .await
            .unwrap();

        let bad = [record("x", vec![1.0, 0.0], 1.0), record("y", vec![1.0], 1.0)];
        assert!(index.replace_all(&bad).await.is_err());
        assert_eq!(index.ids().await.unwrap(), vec!["old"]);

        index
            .replace_all(&[record("new", vec![0.0, 1.0], 1.0)])
            .await
            .unwrap();
        assert_eq!(index.ids().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn load_recipes_spans_chunks_in_request_order() {
        let corpus = InMemoryCorpus::new();
        let total = crate::store::LOOKUP_CHUNK + 3;
        for i in 0..total {
            corpus
                .upsert(&recipe(&format!("r{:04}", i), "R", 1.0))
                .await
                .unwrap();
        }
        let mut ids: Vec<String> = corpus.ids().await.unwrap();
        ids.reverse();
        ids.push("missing".into());

        let got = crate::store::load_recipes(&corpus, &ids).await.unwrap();
        assert_eq!(got.len(), total);
        assert_eq!(got[0].id, ids[0]);
        assert_eq!(got[total - 1].id, "r0000");
    }
}
