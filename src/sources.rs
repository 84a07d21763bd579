use anyhow::Result;
use tracing::warn;

use larder_core::source::RecipeSource;

use crate::config::Config;
use crate::connector_edamam::EdamamSource;
use crate::connector_spoonacular::SpoonacularSource;

/// Instantiate every configured provider whose credentials are present.
///
/// A provider with missing credentials is skipped with a warning rather
/// than failing the whole ingest.
pub fn build_sources(config: &Config) -> Vec<Box<dyn RecipeSource>> {
    let mut sources: Vec<Box<dyn RecipeSource>> = Vec::new();

    if let Some(cfg) = &config.providers.spoonacular {
        match SpoonacularSource::from_config(cfg) {
            Ok(s) => sources.push(Box::new(s)),
            Err(e) => warn!(provider = "spoonacular", error = %e, "provider skipped"),
        }
    }
    if let Some(cfg) = &config.providers.edamam {
        match EdamamSource::from_config(cfg) {
            Ok(s) => sources.push(Box::new(s)),
            Err(e) => warn!(provider = "edamam", error = %e, "provider skipped"),
        }
    }

    sources
}

fn env_present(var: &str) -> bool {
    std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<14} {:<16} CREDENTIALS", "PROVIDER", "STATUS");

    match &config.providers.spoonacular {
        Some(cfg) => {
            let ok = env_present(&cfg.api_key_env);
            println!(
                "{:<14} {:<16} {}",
                "spoonacular",
                "CONFIGURED",
                if ok { "OK".to_string() } else { format!("MISSING ({})", cfg.api_key_env) }
            );
        }
        None => println!("{:<14} {:<16} -", "spoonacular", "NOT CONFIGURED"),
    }

    match &config.providers.edamam {
        Some(cfg) => {
            let missing: Vec<&str> = [cfg.app_id_env.as_str(), cfg.app_key_env.as_str()]
                .into_iter()
                .filter(|v| !env_present(v))
                .collect();
            println!(
                "{:<14} {:<16} {}",
                "edamam",
                "CONFIGURED",
                if missing.is_empty() {
                    "OK".to_string()
                } else {
                    format!("MISSING ({})", missing.join(", "))
                }
            );
        }
        None => println!("{:<14} {:<16} -", "edamam", "NOT CONFIGURED"),
    }

    Ok(())
}
