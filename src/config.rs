//! TOML configuration.
//!
//! Secrets are never read from the file: provider sections name the
//! environment variables that hold them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: StoreConfig,
    pub index: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Location of one SQLite database file.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    pub spoonacular: Option<SpoonacularConfig>,
    pub edamam: Option<EdamamConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpoonacularConfig {
    #[serde(default = "default_spoonacular_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_spoonacular_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_spoonacular_key_env() -> String {
    "SPOONACULAR_API_KEY".to_string()
}
fn default_spoonacular_url() -> String {
    "https://api.spoonacular.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EdamamConfig {
    #[serde(default = "default_edamam_id_env")]
    pub app_id_env: String,
    #[serde(default = "default_edamam_key_env")]
    pub app_key_env: String,
    #[serde(default = "default_edamam_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_edamam_id_env() -> String {
    "EDAMAM_APP_ID".to_string()
}
fn default_edamam_key_env() -> String {
    "EDAMAM_APP_KEY".to_string()
}
fn default_edamam_url() -> String {
    "https://api.edamam.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    #[serde(default = "default_cuisines")]
    pub cuisines: Vec<String>,
    #[serde(default = "default_per_request_limit")]
    pub per_request_limit: usize,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            cuisines: default_cuisines(),
            per_request_limit: default_per_request_limit(),
            pause_ms: default_pause_ms(),
        }
    }
}

fn default_cuisines() -> Vec<String> {
    ["Mediterranean", "Asian", "Mexican", "Italian", "American"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_per_request_limit() -> usize {
    20
}
fn default_pause_ms() -> u64 {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.default_limit < 1 {
        bail!("retrieval.default_limit must be >= 1");
    }
    if config.seed.per_request_limit < 1 {
        bail!("seed.per_request_limit must be >= 1");
    }

    let embedding = &config.embedding;
    if embedding.batch_size < 1 {
        bail!("embedding.batch_size must be >= 1");
    }
    if embedding.timeout_secs < 1 {
        bail!("embedding.timeout_secs must be >= 1");
    }

    match embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    embedding.provider
                );
            }
            if embedding.dims.is_none() {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    if let Some(s) = &config.providers.spoonacular {
        if s.timeout_secs < 1 {
            bail!("providers.spoonacular.timeout_secs must be >= 1");
        }
    }
    if let Some(e) = &config.providers.edamam {
        if e.timeout_secs < 1 {
            bail!("providers.edamam.timeout_secs must be >= 1");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
        [corpus]
        path = "./data/corpus.sqlite"
        [index]
        path = "./data/index.sqlite"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.retrieval.default_limit, 15);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.seed.per_request_limit, 20);
        assert_eq!(config.seed.cuisines.len(), 5);
        assert!(config.providers.spoonacular.is_none());
    }

    #[test]
    fn provider_sections_fill_defaults() {
        let config = parse(&format!(
            "{}\n[providers.spoonacular]\n[providers.edamam]\ntimeout_secs = 5\n",
            MINIMAL
        ))
        .unwrap();
        let s = config.providers.spoonacular.unwrap();
        assert_eq!(s.api_key_env, "SPOONACULAR_API_KEY");
        assert_eq!(s.base_url, "https://api.spoonacular.com");
        let e = config.providers.edamam.unwrap();
        assert_eq!(e.app_id_env, "EDAMAM_APP_ID");
        assert_eq!(e.timeout_secs, 5);
    }

    #[test]
    fn openai_requires_model_and_dims() {
        let err = parse(&format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL));
        assert!(err.unwrap_err().to_string().contains("embedding.model"));

        let ok = parse(&format!(
            "{}\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
            MINIMAL
        ));
        assert!(ok.is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = parse(&format!("{}\n[embedding]\nprovider = \"magic\"\n", MINIMAL));
        assert!(err.unwrap_err().to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = parse(&format!("{}\n[retrieval]\ndefault_limit = 0\n", MINIMAL));
        assert!(err.is_err());
    }
}
