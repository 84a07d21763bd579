//! `larder audit`: report Corpus / Vector Index divergence.
//!
//! Reports only. Repair is an explicit operator action (`larder embed rebuild`).

use anyhow::Result;
use serde::Serialize;

use larder_core::audit::{audit, drift, AuditReport, DriftReport};

use crate::config::Config;
use crate::embedding::configured_model_name;
use crate::sqlite_store::Stores;

#[derive(Serialize)]
struct AuditOutput {
    #[serde(flatten)]
    counts: AuditReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    drift: Option<DriftReport>,
}

pub async fn run_audit(config: &Config, with_ids: bool, json: bool) -> Result<()> {
    let stores = Stores::open(config, &configured_model_name(&config.embedding)).await?;
    let result = collect(&stores, with_ids).await;
    stores.close().await;
    let output = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let counts = &output.counts;
    println!("audit");
    println!("  corpus:  {}", counts.corpus_count);
    println!("  index:   {}", counts.index_count);
    println!("  in sync: {}", counts.in_sync);

    if let Some(d) = &output.drift {
        println!("  missing from index: {}", d.missing_from_index.len());
        for id in &d.missing_from_index {
            println!("    {}", id);
        }
        println!("  orphaned vectors: {}", d.orphaned_vectors.len());
        for id in &d.orphaned_vectors {
            println!("    {}", id);
        }
    }
    Ok(())
}

async fn collect(stores: &Stores, with_ids: bool) -> Result<AuditOutput> {
    let counts = audit(&stores.corpus, &stores.index).await?;
    let drift = if with_ids {
        Some(drift(&stores.corpus, &stores.index).await?)
    } else {
        None
    };
    Ok(AuditOutput { counts, drift })
}
