//! `larder search`: goal-driven recipe retrieval from the CLI.

use anyhow::Result;
use tracing::info;

use larder_core::models::{Goal, Recipe, SearchFilter};
use larder_core::search::search_detailed;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::sqlite_store::Stores;

pub async fn run_search(
    config: &Config,
    goal: Goal,
    cuisines: Vec<String>,
    allergens: Vec<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let embedder = create_provider(&config.embedding)?;
    let stores = Stores::open(config, embedder.model_name()).await?;

    let filter = SearchFilter::new(goal, limit.unwrap_or(config.retrieval.default_limit))
        .with_cuisines(cuisines)
        .with_allergens(allergens);

    let result = search_detailed(&stores.corpus, &stores.index, &embedder, &filter).await;
    stores.close().await;
    let outcome = result?;

    info!(
        goal = %goal,
        candidates = outcome.candidates,
        fallback = outcome.used_fallback,
        dropped_allergen = outcome.dropped_allergen,
        dropped_missing = outcome.dropped_missing,
        "search finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.recipes)?);
        return Ok(());
    }

    if outcome.recipes.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, recipe) in outcome.recipes.iter().enumerate() {
        print_recipe_line(i + 1, recipe);
    }
    Ok(())
}

fn print_recipe_line(rank: usize, recipe: &Recipe) {
    let n = &recipe.nutrition;
    println!("{}. {} / {}", rank, recipe.cuisine, recipe.name);
    println!(
        "    nutrition: {:.0} kcal, {:.1}g protein, {:.1}g carbs, {:.1}g fat",
        n.calories, n.protein, n.carbohydrates, n.fat
    );
    if !recipe.tags.is_empty() {
        let tags: Vec<&str> = recipe.tags.iter().map(String::as_str).collect();
        println!("    tags: {}", tags.join(", "));
    }
    println!("    source: {}", recipe.source);
    println!("    id: {}", recipe.id);
    println!();
}
