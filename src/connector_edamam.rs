//! Edamam recipe provider.
//!
//! Calls `GET /api/recipes/v2` with a diet label derived from the goal and
//! returns the raw `hits[].recipe` objects.
//!
//! # Configuration
//!
//! ```toml
//! [providers.edamam]
//! app_id_env = "EDAMAM_APP_ID"
//! app_key_env = "EDAMAM_APP_KEY"
//! base_url = "https://api.edamam.com"
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use larder_core::models::Goal;
use larder_core::source::RecipeSource;

use crate::config::EdamamConfig;

pub struct EdamamSource {
    config: EdamamConfig,
    app_id: String,
    app_key: String,
    client: reqwest::Client,
}

fn env_secret(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{} is not set", var))
}

impl EdamamSource {
    pub fn from_config(config: &EdamamConfig) -> Result<Self> {
        let app_id = env_secret(&config.app_id_env)?;
        let app_key = env_secret(&config.app_key_env)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            app_id,
            app_key,
            client,
        })
    }
}

/// Edamam diet label for a goal.
pub fn diet_label(goal: Goal) -> &'static str {
    match goal {
        Goal::ReduceIntake => "low-carb",
        Goal::BuildMuscle => "high-protein",
        Goal::Maintain => "balanced",
    }
}

/// Query parameters for one request, excluding credentials.
pub fn query_params(goal: Goal, cuisine: Option<&str>) -> Vec<(String, String)> {
    let mut params = vec![
        ("type".to_string(), "public".to_string()),
        ("diet".to_string(), diet_label(goal).to_string()),
    ];
    if let Some(c) = cuisine.filter(|c| !c.trim().is_empty()) {
        params.push(("cuisineType".to_string(), c.trim().to_lowercase()));
    }
    params
}

/// Extract `hits[].recipe` from a v2 search response.
pub fn parse_response(json: &Value) -> Result<Vec<Value>> {
    let hits = json
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Edamam response: missing hits array"))?;
    Ok(hits
        .iter()
        .filter_map(|hit| hit.get("recipe").cloned())
        .collect())
}

#[async_trait]
impl RecipeSource for EdamamSource {
    fn name(&self) -> &str {
        "edamam"
    }

    async fn fetch(&self, goal: Goal, cuisine: Option<&str>, limit: usize) -> Result<Vec<Value>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/api/recipes/v2",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("app_id", self.app_id.as_str()), ("app_key", self.app_key.as_str())])
            .query(&query_params(goal, cuisine))
            .send()
            .await
            .context("Edamam request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Edamam API error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        // v2 pages are fixed-size; trim to what was asked for.
        let mut recipes = parse_response(&json)?;
        recipes.truncate(limit);
        Ok(recipes)
    }
}
