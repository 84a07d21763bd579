//! Goal-driven hybrid retrieval.
//!
//! A search goes index first, Corpus second:
//!
//! 1. Build the query text from the goal phrase plus requested cuisines.
//! 2. Embed it with the same [`Embedder`] used at ingest time.
//! 3. Query the [`VectorIndex`] for `min(2 × limit, index size)` candidates
//!    under the goal's [`MetadataFilter`]. If that errors or yields nothing,
//!    retry once without a filter. An index that rejects the query vector
//!    (another model or width) rejects the retry too, and the search fails.
//! 4. Drop candidates whose document mentions any allergen
//!    (case-insensitive substring).
//! 5. Truncate to `limit` in index order.
//! 6. Resolve survivors against the [`Corpus`] in one batched lookup. Ids
//!    the Corpus does not know are dropped silently.
//!
//! Cuisine never enters the metadata filter; the index predicate language
//! supports a single field only, so cuisine is left to semantic ranking.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::embedding::Embedder;
use crate::models::{Recipe, SearchFilter};
use crate::store::{Corpus, VectorHit, VectorIndex};

/// Detailed result of a search, for logging and `--explain`-style output.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub recipes: Vec<Recipe>,
    /// Candidates returned by the index before allergen filtering.
    pub candidates: usize,
    /// Whether the unfiltered fallback query was used.
    pub used_fallback: bool,
    pub dropped_allergen: usize,
    /// Index hits with no Corpus row.
    pub dropped_missing: usize,
}

/// Build the query text for a goal and optional cuisines.
pub fn query_text(filter: &SearchFilter) -> String {
    let mut text = filter.goal.query_phrase().to_string();
    let cuisines: Vec<&str> = filter
        .cuisines
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !cuisines.is_empty() {
        text.push(' ');
        text.push_str(&cuisines.join(" "));
        text.push_str(" cuisine");
    }
    text
}

/// Whether `document` mentions any of `allergens` (case-insensitive).
///
/// Blank tokens are ignored; they would otherwise match every document.
pub fn contains_allergen(document: &str, allergens: &[String]) -> bool {
    let haystack = document.to_lowercase();
    allergens
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .any(|a| haystack.contains(&a))
}

/// Search and return only the resolved recipes.
pub async fn search<C, V, E>(
    corpus: &C,
    index: &V,
    embedder: &E,
    filter: &SearchFilter,
) -> Result<Vec<Recipe>>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    Ok(search_detailed(corpus, index, embedder, filter).await?.recipes)
}

/// Search and report per-stage counts alongside the recipes.
pub async fn search_detailed<C, V, E>(
    corpus: &C,
    index: &V,
    embedder: &E,
    filter: &SearchFilter,
) -> Result<SearchOutcome>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    if filter.limit == 0 {
        bail!("search limit must be at least 1");
    }

    let size = index.count().await.context("failed to count vector index")?;
    if size == 0 {
        debug!("vector index is empty; nothing to search");
        return Ok(SearchOutcome::default());
    }

    let text = query_text(filter);
    let query = match embedder.embed_one(&text).await {
        Ok(v) => v,
        Err(e) => {
            warn!(model = embedder.model_name(), error = %e, "query embedding failed");
            return Ok(SearchOutcome::default());
        }
    };

    let k = (filter.limit.saturating_mul(2)).min(size as usize);
    let (hits, used_fallback) = candidates(index, &query, k, filter).await?;
    let mut outcome = SearchOutcome {
        candidates: hits.len(),
        used_fallback,
        ..Default::default()
    };

    let mut kept: Vec<VectorHit> = Vec::with_capacity(filter.limit);
    for hit in hits {
        if contains_allergen(&hit.document, &filter.allergens) {
            outcome.dropped_allergen += 1;
            continue;
        }
        kept.push(hit);
        if kept.len() == filter.limit {
            break;
        }
    }
    if kept.is_empty() {
        return Ok(outcome);
    }

    let ids: Vec<String> = kept.iter().map(|h| h.id.clone()).collect();
    let mut by_id: HashMap<String, Recipe> = corpus
        .get_by_ids(&ids)
        .await
        .context("failed to resolve search hits in corpus")?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    for id in &ids {
        match by_id.remove(id) {
            Some(recipe) => outcome.recipes.push(recipe),
            None => {
                debug!(recipe_id = %id, "indexed recipe missing from corpus; dropping");
                outcome.dropped_missing += 1;
            }
        }
    }
    Ok(outcome)
}

/// Filtered query with one unfiltered retry.
async fn candidates<V: VectorIndex + ?Sized>(
    index: &V,
    query: &[f32],
    k: usize,
    filter: &SearchFilter,
) -> Result<(Vec<VectorHit>, bool)> {
    let predicate = filter.goal.metadata_filter();
    match index.query(query, k, Some(&predicate)).await {
        Ok(hits) if !hits.is_empty() => return Ok((hits, false)),
        Ok(_) => debug!(filter = %predicate, "filtered query returned nothing; retrying unfiltered"),
        Err(e) => warn!(filter = %predicate, error = %e, "filtered query failed; retrying unfiltered"),
    }
    let hits = index
        .query(query, k, None)
        .await
        .context("vector index query failed")?;
    Ok((hits, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{embedding_text, vector_record};
    use crate::embedding::HashEmbedder;
    use crate::models::{Goal, MetadataFilter, Nutrition, VectorRecord};
    use crate::store::memory::{InMemoryCorpus, InMemoryVectorIndex};
    use async_trait::async_trait;

    fn recipe(id: &str, name: &str, calories: f64, ingredients: &[&str]) -> Recipe {
        Recipe {
            id: id.into(),
            name: name.into(),
            source: "test".into(),
            cuisine: "Thai".into(),
            description: String::new(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: String::new(),
            nutrition: Nutrition::new(calories, 20.0, 20.0, 10.0),
            tags: Default::default(),
            popularity_score: 0,
            created_at: 0,
            last_seen_at: 0,
        }
    }

    async fn seed(corpus: &InMemoryCorpus, index: &InMemoryVectorIndex, recipes: &[Recipe]) {
        let embedder = HashEmbedder::new(64);
        let mut records = Vec::new();
        for r in recipes {
            corpus.upsert(r).await.unwrap();
            let text = embedding_text(r);
            let v = embedder.embed_one(&text).await.unwrap();
            records.push(vector_record(r, text, v));
        }
        index.upsert_batch(&records).await.unwrap();
    }

    #[test]
    fn query_text_appends_cuisines() {
        let f = SearchFilter::new(Goal::Maintain, 5);
        assert_eq!(query_text(&f), Goal::Maintain.query_phrase());

        let f = SearchFilter::new(Goal::Maintain, 5).with_cuisines(["Thai", " ", "Indian"]);
        assert!(query_text(&f).ends_with(" Thai Indian cuisine"));
    }

    #[test]
    fn allergen_match_is_case_insensitive_substring() {
        let doc = "Ingredients: Peanut butter, rice";
        assert!(contains_allergen(doc, &["peanut".into()]));
        assert!(contains_allergen(doc, &["RICE".into()]));
        assert!(!contains_allergen(doc, &["shellfish".into()]));
        assert!(!contains_allergen(doc, &["  ".into()]));
    }

    #[tokio::test]
    async fn empty_index_returns_empty() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        let got = search(&corpus, &index, &HashEmbedder::new(64), &SearchFilter::new(Goal::Maintain, 5))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn embedder_of_other_width_is_an_error() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        seed(&corpus, &index, &[recipe("a", "Soup", 300.0, &["leek"])]).await;

        let result = search(&corpus, &index, &HashEmbedder::new(32), &SearchFilter::new(Goal::Maintain, 5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        let err = search(&corpus, &index, &HashEmbedder::new(64), &SearchFilter::new(Goal::Maintain, 0)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn goal_filter_excludes_heavy_recipes() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        seed(
            &corpus,
            &index,
            &[
                recipe("a", "Light Soup", 300.0, &["leek"]),
                recipe("b", "Heavy Stew", 700.0, &["beef"]),
                recipe("c", "Salad", 450.0, &["lettuce"]),
            ],
        )
        .await;

        let out = search_detailed(
            &corpus,
            &index,
            &HashEmbedder::new(64),
            &SearchFilter::new(Goal::ReduceIntake, 10),
        )
        .await
        .unwrap();
        assert!(!out.used_fallback);
        let mut ids: Vec<&str> = out.recipes.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn allergens_drop_candidates() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        seed(
            &corpus,
            &index,
            &[
                recipe("a", "Satay", 300.0, &["peanut sauce", "chicken"]),
                recipe("b", "Curry", 350.0, &["coconut", "tofu"]),
            ],
        )
        .await;

        let f = SearchFilter::new(Goal::ReduceIntake, 10).with_allergens(["Peanut"]);
        let out = search_detailed(&corpus, &index, &HashEmbedder::new(64), &f).await.unwrap();
        assert_eq!(out.dropped_allergen, 1);
        assert_eq!(out.recipes.len(), 1);
        assert_eq!(out.recipes[0].id, "b");
    }

    #[tokio::test]
    async fn falls_back_when_filter_matches_nothing() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        // Every recipe is below the maintain threshold of 200 calories.
        seed(&corpus, &index, &[recipe("a", "Broth", 50.0, &["water"])]).await;

        let out = search_detailed(
            &corpus,
            &index,
            &HashEmbedder::new(64),
            &SearchFilter::new(Goal::Maintain, 3),
        )
        .await
        .unwrap();
        assert!(out.used_fallback);
        assert_eq!(out.recipes.len(), 1);
    }

    #[tokio::test]
    async fn indexed_ids_missing_from_corpus_are_dropped() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        seed(&corpus, &index, &[recipe("a", "Soup", 300.0, &["leek"])]).await;

        let ghost = recipe("ghost", "Ghost", 300.0, &["air"]);
        let text = embedding_text(&ghost);
        let v = HashEmbedder::new(64).embed_one(&text).await.unwrap();
        index.upsert_batch(&[vector_record(&ghost, text, v)]).await.unwrap();

        let out = search_detailed(
            &corpus,
            &index,
            &HashEmbedder::new(64),
            &SearchFilter::new(Goal::ReduceIntake, 10),
        )
        .await
        .unwrap();
        assert_eq!(out.dropped_missing, 1);
        assert_eq!(out.recipes.len(), 1);
        assert_eq!(out.recipes[0].id, "a");
    }

    #[tokio::test]
    async fn result_never_exceeds_limit() {
        let corpus = InMemoryCorpus::new();
        let index = InMemoryVectorIndex::new();
        let recipes: Vec<Recipe> = (0..6)
            .map(|i| recipe(&format!("r{}", i), &format!("Dish {}", i), 300.0, &["rice"]))
            .collect();
        seed(&corpus, &index, &recipes).await;

        let got = search(&corpus, &index, &HashEmbedder::new(64), &SearchFilter::new(Goal::ReduceIntake, 4))
            .await
            .unwrap();
        assert_eq!(got.len(), 4);
    }

    /// Index whose filtered queries always fail.
    struct FilterlessIndex(InMemoryVectorIndex);

    #[async_trait]
    impl VectorIndex for FilterlessIndex {
        async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<()> {
            self.0.upsert_batch(records).await
        }
        async fn query(
            &self,
            embedding: &[f32],
            k: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<VectorHit>> {
            if filter.is_some() {
                bail!("filters unsupported");
            }
            self.0.query(embedding, k, None).await
        }
        async fn count(&self) -> Result<u64> {
            self.0.count().await
        }
        async fn ids(&self) -> Result<Vec<String>> {
            self.0.ids().await
        }
        async fn delete_all(&self) -> Result<()> {
            self.0.delete_all().await
        }
    }

    #[tokio::test]
    async fn falls_back_when_filtered_query_errors() {
        let corpus = InMemoryCorpus::new();
        let inner = InMemoryVectorIndex::new();
        seed(&corpus, &inner, &[recipe("a", "Heavy Stew", 900.0, &["beef"])]).await;
        let index = FilterlessIndex(inner);

        let out = search_detailed(
            &corpus,
            &index,
            &HashEmbedder::new(64),
            &SearchFilter::new(Goal::ReduceIntake, 5),
        )
        .await
        .unwrap();
        assert!(out.used_fallback);
        assert_eq!(out.recipes[0].id, "a");
    }
}
