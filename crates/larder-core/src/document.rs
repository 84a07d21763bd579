//! Embedding text construction.
//!
//! The text built here is both the input to the embedder and the
//! `document` retained in the vector index for allergen post-filtering.

use crate::models::{Recipe, RecipeMetadata, VectorRecord};

/// Only the first N ingredients are embedded to bound input size and cost.
pub const MAX_EMBEDDED_INGREDIENTS: usize = 10;

/// Build the text that represents a recipe in embedding space.
pub fn embedding_text(recipe: &Recipe) -> String {
    let ingredients = recipe
        .ingredients
        .iter()
        .take(MAX_EMBEDDED_INGREDIENTS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let tags = recipe
        .tags
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let n = &recipe.nutrition;

    format!(
        "Recipe: {}\n\
         Cuisine: {}\n\
         Description: {}\n\
         Ingredients: {}\n\
         Nutrition: {} calories, {}g protein, {}g carbs, {}g fat\n\
         Tags: {}",
        recipe.name,
        recipe.cuisine,
        recipe.description,
        ingredients,
        fmt_amount(n.calories),
        fmt_amount(n.protein),
        fmt_amount(n.carbohydrates),
        fmt_amount(n.fat),
        tags,
    )
}

/// Pair a recipe with its computed embedding into an index record.
pub fn vector_record(recipe: &Recipe, document: String, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: recipe.id.clone(),
        embedding,
        metadata: RecipeMetadata::from(recipe),
        document,
    }
}

fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.1}", v)
    }
}
