//! Spoonacular recipe provider.
//!
//! Calls `GET /recipes/complexSearch` with per-goal nutrition bounds and
//! returns the raw `results[]` objects. Normalization happens later in
//! [`larder_core::normalize`].
//!
//! # Configuration
//!
//! ```toml
//! [providers.spoonacular]
//! api_key_env = "SPOONACULAR_API_KEY"
//! base_url = "https://api.spoonacular.com"
//! timeout_secs = 30
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use larder_core::models::Goal;
use larder_core::source::RecipeSource;

use crate::config::SpoonacularConfig;

pub struct SpoonacularSource {
    config: SpoonacularConfig,
    api_key: String,
    client: reqwest::Client,
}

impl SpoonacularSource {
    /// Build the source, reading the API key from the configured variable.
    pub fn from_config(config: &SpoonacularConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} is not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }
}

/// Nutrition bounds sent to `complexSearch` for each goal.
pub fn nutrition_params(goal: Goal) -> &'static [(&'static str, u32)] {
    match goal {
        Goal::ReduceIntake => &[("maxCalories", 500), ("minProtein", 25), ("maxCarbs", 50)],
        Goal::BuildMuscle => &[("minCalories", 400), ("minProtein", 35), ("minCarbs", 40)],
        Goal::Maintain => &[("minCalories", 300), ("maxCalories", 600), ("minProtein", 20)],
    }
}

/// Query parameters for one request, excluding the API key.
pub fn query_params(goal: Goal, cuisine: Option<&str>, limit: usize) -> Vec<(String, String)> {
    let mut params = vec![
        ("number".to_string(), limit.to_string()),
        ("addRecipeNutrition".to_string(), "true".to_string()),
        ("fillIngredients".to_string(), "true".to_string()),
    ];
    for (key, value) in nutrition_params(goal) {
        params.push((key.to_string(), value.to_string()));
    }
    if let Some(c) = cuisine.filter(|c| !c.trim().is_empty()) {
        params.push(("cuisine".to_string(), c.trim().to_string()));
    }
    params
}

/// Extract `results[]` from a `complexSearch` response.
pub fn parse_response(json: &Value) -> Result<Vec<Value>> {
    json.get("results")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| anyhow!("Invalid Spoonacular response: missing results array"))
}

#[async_trait]
impl RecipeSource for SpoonacularSource {
    fn name(&self) -> &str {
        "spoonacular"
    }

    async fn fetch(&self, goal: Goal, cuisine: Option<&str>, limit: usize) -> Result<Vec<Value>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/recipes/complexSearch",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(&query_params(goal, cuisine, limit))
            .send()
            .await
            .context("Spoonacular request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Spoonacular API error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        let mut results = parse_response(&json)?;
        results.truncate(limit);
        Ok(results)
    }
}
