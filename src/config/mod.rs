// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|s| s.to_str());
    let config = if matches!(extension, Some("yaml") | Some("yml")) {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

impl AccountConfig {
    /// Reads `AWS_PROFILE`, `AWS_ACCOUNT_ID`, `AWS_REGION` and `DOMAIN_NAME`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let domain: HashMap<String, String> = vars
            .iter()
            .filter(|(key, _)| key.as_str() == "DOMAIN_NAME")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let settings = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("AWS").source(Some(vars)))
            .add_source(::config::Environment::default().source(Some(domain)))
            .build()
            .context("Failed to read account settings from the environment")?;

        settings
            .try_deserialize()
            .context("AWS_REGION must be set in the environment")
    }
}
