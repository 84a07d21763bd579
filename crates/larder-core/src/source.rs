//! Recipe provider abstraction.
//!
//! A [`RecipeSource`] fetches provider-native JSON payloads. Payloads stay
//! untyped until [`normalize`](crate::normalize::normalize) detects their
//! provenance, so one ingest may merge several providers.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::Goal;

/// An external recipe provider.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Provider identity used in logs (e.g. `"spoonacular"`).
    fn name(&self) -> &str;

    /// Fetch up to `limit` raw recipes suited to `goal`.
    async fn fetch(&self, goal: Goal, cuisine: Option<&str>, limit: usize) -> Result<Vec<Value>>;
}

/// A source that serves a fixed list of payloads, ignoring goal/cuisine.
///
/// Useful for fixtures, tests, and replaying captured provider responses.
pub struct StaticSource {
    name: String,
    payloads: Vec<Value>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, payloads: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            payloads,
        }
    }
}

#[async_trait]
impl RecipeSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _goal: Goal, _cuisine: Option<&str>, limit: usize) -> Result<Vec<Value>> {
        Ok(self.payloads.iter().take(limit).cloned().collect())
    }
}
