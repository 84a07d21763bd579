//! Provider payload normalization.
//!
//! Each external recipe provider returns its own JSON shape. A
//! [`Provenance`] tag is detected from the payload shape and dispatches to
//! the matching normalizer, which maps it onto the canonical [`Recipe`].
//!
//! Normalizers are lenient: any missing optional field falls back to a
//! documented default (empty string or list, `"General"` cuisine, zero
//! nutrition). Only a payload without a usable identifier is rejected.

use std::collections::BTreeSet;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Nutrition, Recipe};

/// Fallback cuisine when a provider does not classify a recipe.
pub const DEFAULT_CUISINE: &str = "General";

/// Spoonacular summaries are long HTML blurbs; keep the head only.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload shape not recognised by any provider")]
    UnknownShape,
    #[error("{provider} payload is missing its identifier field `{field}`")]
    MissingId {
        provider: &'static str,
        field: &'static str,
    },
}

/// Which provider a raw payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Spoonacular,
    Edamam,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Spoonacular => "spoonacular",
            Provenance::Edamam => "edamam",
        }
    }

    /// Detect the provider from the payload shape.
    ///
    /// Spoonacular results carry a numeric `id` (and usually
    /// `spoonacularSourceUrl`); Edamam recipes are keyed by `uri`.
    pub fn detect(raw: &Value) -> Option<Provenance> {
        let obj = raw.as_object()?;
        if obj.contains_key("spoonacularSourceUrl") || obj.contains_key("id") {
            Some(Provenance::Spoonacular)
        } else if obj.contains_key("uri") {
            Some(Provenance::Edamam)
        } else {
            None
        }
    }

    pub fn normalize(&self, raw: &Value) -> Result<Recipe, NormalizeError> {
        if !raw.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        match self {
            Provenance::Spoonacular => normalize_spoonacular(raw),
            Provenance::Edamam => normalize_edamam(raw),
        }
    }
}

/// Detect the provenance of `raw` and normalize it.
pub fn normalize(raw: &Value) -> Result<Recipe, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::NotAnObject);
    }
    Provenance::detect(raw)
        .ok_or(NormalizeError::UnknownShape)?
        .normalize(raw)
}

fn normalize_spoonacular(raw: &Value) -> Result<Recipe, NormalizeError> {
    let id = match raw.get("id") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            return Err(NormalizeError::MissingId {
                provider: "spoonacular",
                field: "id",
            })
        }
    };

    let nutrients = raw
        .pointer("/nutrition/nutrients")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let nutrient = |name: &str| -> f64 {
        nutrients
            .iter()
            .find(|n| n.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|n| n.get("amount"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    let nutrition = Nutrition::new(
        nutrient("Calories"),
        nutrient("Protein"),
        nutrient("Carbohydrates"),
        nutrient("Fat"),
    );

    let mut tags = BTreeSet::new();
    for (flag, tag) in [
        ("vegetarian", "vegetarian"),
        ("vegan", "vegan"),
        ("glutenFree", "gluten-free"),
    ] {
        if raw.get(flag).and_then(Value::as_bool).unwrap_or(false) {
            tags.insert(tag.to_string());
        }
    }
    if nutrition.protein > 30.0 {
        tags.insert("high-protein".to_string());
    }
    if nutrition.carbohydrates < 30.0 {
        tags.insert("low-carb".to_string());
    }

    let description: String = str_field(raw, "summary")
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect();

    Ok(Recipe {
        id: format!("spoon_{}", id),
        name: str_field(raw, "title"),
        source: Provenance::Spoonacular.as_str().to_string(),
        cuisine: first_str(raw, "cuisines"),
        description,
        ingredients: names_in(raw, "extendedIngredients", "name"),
        instructions: str_field(raw, "instructions"),
        nutrition,
        tags,
        popularity_score: 0,
        created_at: 0,
        last_seen_at: 0,
    })
}

fn normalize_edamam(raw: &Value) -> Result<Recipe, NormalizeError> {
    let uri = raw
        .get("uri")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or(NormalizeError::MissingId {
            provider: "edamam",
            field: "uri",
        })?;

    let quantity = |code: &str| -> f64 {
        raw.get("totalNutrients")
            .and_then(|n| n.get(code))
            .and_then(|n| n.get("quantity"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };

    let dish_type = raw
        .get("dishType")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .unwrap_or("");

    let tags: BTreeSet<String> = ["healthLabels", "dietLabels"]
        .iter()
        .flat_map(|key| string_list(raw, key))
        .collect();

    Ok(Recipe {
        id: format!("edamam_{}", stable_id(uri)),
        name: str_field(raw, "label"),
        source: Provenance::Edamam.as_str().to_string(),
        cuisine: first_str(raw, "cuisineType"),
        description: format!("{} from {}", dish_type, str_field(raw, "source")),
        ingredients: names_in(raw, "ingredients", "food"),
        // Edamam only links out to the publisher's page.
        instructions: str_field(raw, "url"),
        nutrition: Nutrition::new(
            quantity("ENERC_KCAL"),
            quantity("PROCNT"),
            quantity("CHOCDF"),
            quantity("FAT"),
        ),
        tags,
        popularity_score: 0,
        created_at: 0,
        last_seen_at: 0,
    })
}

/// First 16 hex chars of SHA-256, stable across runs and machines.
fn stable_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn first_str(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_CUISINE)
        .to_string()
}

fn string_list(raw: &Value, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn names_in(raw: &Value, list: &str, field: &str) -> Vec<String> {
    raw.get(list)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .map(|item| {
                    item.get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}
