//! Recipe retrieval by ID.

use anyhow::{bail, Result};

use larder_core::models::Recipe;
use larder_core::store::Corpus;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteCorpus;

/// Fetch one recipe from the Corpus, failing if it does not exist.
pub async fn get_recipe(config: &Config, id: &str) -> Result<Recipe> {
    let pool = db::connect(&config.corpus.path).await?;
    let corpus = SqliteCorpus::new(pool.clone());
    let recipe = corpus.get(id).await;
    pool.close().await;

    match recipe? {
        Some(r) => Ok(r),
        None => bail!("recipe not found: {}", id),
    }
}

/// CLI entry point: prints the recipe or exits with status 1.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let recipe = match get_recipe(config, id).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    let n = &recipe.nutrition;
    println!("--- Recipe ---");
    println!("id:           {}", recipe.id);
    println!("name:         {}", recipe.name);
    println!("source:       {}", recipe.source);
    println!("cuisine:      {}", recipe.cuisine);
    println!(
        "nutrition:    {:.0} kcal, {:.1}g protein, {:.1}g carbs, {:.1}g fat",
        n.calories, n.protein, n.carbohydrates, n.fat
    );
    let tags: Vec<&str> = recipe.tags.iter().map(String::as_str).collect();
    println!("tags:         {}", tags.join(", "));
    println!("popularity:   {}", recipe.popularity_score);
    println!("created_at:   {}", format_ts_iso(recipe.created_at));
    println!("last_seen_at: {}", format_ts_iso(recipe.last_seen_at));
    println!();

    if !recipe.description.is_empty() {
        println!("--- Description ---");
        println!("{}", recipe.description);
        println!();
    }

    println!("--- Ingredients ({}) ---", recipe.ingredients.len());
    for ingredient in &recipe.ingredients {
        println!("- {}", ingredient);
    }
    println!();

    println!("--- Instructions ---");
    println!("{}", recipe.instructions);

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
