//! Cross-store consistency checks.
//!
//! The auditor detects and reports divergence between the [`Corpus`] and
//! the [`VectorIndex`]. It never repairs anything.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::store::{Corpus, VectorIndex};

/// Count-level comparison of the two stores.
///
/// `in_sync` only compares sizes: two different id sets of equal size are
/// reported in sync. Use [`drift`] for an id-level comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub corpus_count: u64,
    pub index_count: u64,
    pub in_sync: bool,
}

/// Id-level comparison of the two stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Corpus recipes with no vector (e.g. a crash between write phases).
    pub missing_from_index: Vec<String>,
    /// Vectors whose id has no Corpus row. Search already excludes these.
    pub orphaned_vectors: Vec<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.missing_from_index.is_empty() && self.orphaned_vectors.is_empty()
    }
}

pub async fn audit<C, V>(corpus: &C, index: &V) -> Result<AuditReport>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
{
    let corpus_count = corpus.count().await.context("failed to count corpus")?;
    let index_count = index.count().await.context("failed to count vector index")?;
    Ok(AuditReport {
        corpus_count,
        index_count,
        in_sync: corpus_count == index_count,
    })
}

pub async fn drift<C, V>(corpus: &C, index: &V) -> Result<DriftReport>
where
    C: Corpus + ?Sized,
    V: VectorIndex + ?Sized,
{
    let corpus_ids: BTreeSet<String> = corpus
        .ids()
        .await
        .context("failed to list corpus ids")?
        .into_iter()
        .collect();
    let index_ids: BTreeSet<String> = index
        .ids()
        .await
        .context("failed to list vector index ids")?
        .into_iter()
        .collect();

    Ok(DriftReport {
        missing_from_index: corpus_ids.difference(&index_ids).cloned().collect(),
        orphaned_vectors: index_ids.difference(&corpus_ids).cloned().collect(),
    })
}
