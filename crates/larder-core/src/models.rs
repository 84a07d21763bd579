//! Core data models used throughout Larder.
//!
//! These types represent the recipes, vector records, and search filters
//! that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Macro nutrients for a single serving. All values are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
}

impl Nutrition {
    /// Build a nutrition record, clamping negative or non-finite values to zero.
    pub fn new(calories: f64, protein: f64, carbohydrates: f64, fat: f64) -> Self {
        Self {
            calories: non_negative(calories),
            protein: non_negative(protein),
            carbohydrates: non_negative(carbohydrates),
            fat: non_negative(fat),
        }
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Canonical recipe, as stored in the Corpus.
///
/// `created_at` and `last_seen_at` are owned by the Corpus: normalization
/// leaves them at zero and the store stamps them on upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Provider-prefixed identifier (`spoon_123`, `edamam_ab12…`).
    pub id: String,
    pub name: String,
    /// Provenance tag (`spoonacular`, `edamam`).
    pub source: String,
    pub cuisine: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub nutrition: Nutrition,
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub popularity_score: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub last_seen_at: i64,
}

/// Denormalized subset of a [`Recipe`] stored next to its embedding so
/// the index can evaluate filter predicates without touching the Corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeMetadata {
    pub name: String,
    pub source: String,
    pub cuisine: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub tags: Vec<String>,
}

impl From<&Recipe> for RecipeMetadata {
    fn from(r: &Recipe) -> Self {
        Self {
            name: r.name.clone(),
            source: r.source.clone(),
            cuisine: r.cuisine.clone(),
            calories: r.nutrition.calories,
            protein: r.nutrition.protein,
            carbohydrates: r.nutrition.carbohydrates,
            fat: r.nutrition.fat,
            tags: r.tags.iter().cloned().collect(),
        }
    }
}

/// One row of the Vector Index. `id` must equal a `Recipe.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: RecipeMetadata,
    /// The exact text that was embedded.
    pub document: String,
}

/// Fitness goal driving both the query phrase and the metadata filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Goal {
    #[serde(alias = "lose_fat")]
    ReduceIntake,
    #[serde(alias = "gain_muscle")]
    BuildMuscle,
    Maintain,
}

impl Goal {
    pub const ALL: [Goal; 3] = [Goal::ReduceIntake, Goal::BuildMuscle, Goal::Maintain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::ReduceIntake => "reduce-intake",
            Goal::BuildMuscle => "build-muscle",
            Goal::Maintain => "maintain",
        }
    }

    /// Canned phrase capturing the macro priorities of the goal.
    pub fn query_phrase(&self) -> &'static str {
        match self {
            Goal::ReduceIntake => "low calorie, high protein, low carb, healthy fats, weight loss",
            Goal::BuildMuscle => "high protein, moderate carbs, nutrient dense, muscle building",
            Goal::Maintain => "balanced nutrition, moderate calories, healthy eating",
        }
    }

    /// Single-field predicate pushed into the vector index.
    pub fn metadata_filter(&self) -> MetadataFilter {
        match self {
            Goal::ReduceIntake => MetadataFilter::new(MetadataField::Calories, Comparison::Lt, 600.0),
            Goal::BuildMuscle => MetadataFilter::new(MetadataField::Protein, Comparison::Gt, 25.0),
            Goal::Maintain => MetadataFilter::new(MetadataField::Calories, Comparison::Gte, 200.0),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "reduce-intake" | "lose-fat" => Ok(Goal::ReduceIntake),
            "build-muscle" | "gain-muscle" => Ok(Goal::BuildMuscle),
            "maintain" => Ok(Goal::Maintain),
            other => bail!(
                "Unknown goal: '{}'. Use reduce-intake, build-muscle, or maintain.",
                other
            ),
        }
    }
}

/// Numeric metadata columns that a filter may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Calories,
    Protein,
    Carbohydrates,
    Fat,
}

impl MetadataField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Calories => "calories",
            MetadataField::Protein => "protein",
            MetadataField::Carbohydrates => "carbohydrates",
            MetadataField::Fat => "fat",
        }
    }

    pub fn read(&self, meta: &RecipeMetadata) -> f64 {
        match self {
            MetadataField::Calories => meta.calories,
            MetadataField::Protein => meta.protein,
            MetadataField::Carbohydrates => meta.carbohydrates,
            MetadataField::Fat => meta.fat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Gte => lhs >= rhs,
        }
    }
}

/// A single-field comparison against recipe metadata.
///
/// The index predicate language deliberately supports one field only, so
/// cuisine and allergens are handled by ranking and post-filtering instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataFilter {
    pub field: MetadataField,
    pub op: Comparison,
    pub value: f64,
}

impl MetadataFilter {
    pub fn new(field: MetadataField, op: Comparison, value: f64) -> Self {
        Self { field, op, value }
    }

    pub fn matches(&self, meta: &RecipeMetadata) -> bool {
        self.op.holds(self.field.read(meta), self.value)
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field.as_str(), self.op.as_sql(), self.value)
    }
}

/// Inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub goal: Goal,
    pub cuisines: Vec<String>,
    pub allergens: Vec<String>,
    pub limit: usize,
}

impl SearchFilter {
    pub fn new(goal: Goal, limit: usize) -> Self {
        Self {
            goal,
            cuisines: Vec::new(),
            allergens: Vec::new(),
            limit,
        }
    }

    pub fn with_cuisines<I, S>(mut self, cuisines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cuisines = cuisines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allergens<I, S>(mut self, allergens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allergens = allergens.into_iter().map(Into::into).collect();
        self
    }
}
