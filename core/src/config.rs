//! Runtime configuration for the catalog client.
//!
//! Defaults are overridden by `CATALOG_*` environment variables
//! (`CATALOG_BASE_URL`, `CATALOG_PLACEHOLDER_IMAGE`, `CATALOG_TOKEN`).

use config::{Config, Environment, Map};
use serde::Deserialize;

use crate::error::Result;
use crate::image::DEFAULT_PLACEHOLDER;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const ENV_PREFIX: &str = "CATALOG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub placeholder_image: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            placeholder_image: DEFAULT_PLACEHOLDER.to_string(),
            token: None,
        }
    }
}

impl CatalogConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Reads overrides from `vars`, keyed like environment variables.
    pub fn from_source(vars: Map<String, String>) -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("placeholder_image", DEFAULT_PLACEHOLDER)?
            .add_source(environment.try_parsing(false))
            .build()?;
        let mut loaded: CatalogConfig = config.try_deserialize()?;
        if loaded.token.as_deref().is_some_and(str::is_empty) {
            loaded.token = None;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_overrides() {
        let config = CatalogConfig::from_source(Map::new()).unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut vars = Map::new();
        vars.insert("CATALOG_BASE_URL".to_string(), "https://horto.example.org".to_string());
        vars.insert("CATALOG_TOKEN".to_string(), "secret".to_string());
        let config = CatalogConfig::from_source(vars).unwrap();
        assert_eq!(config.base_url, "https://horto.example.org");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.placeholder_image, DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn empty_token_means_none() {
        let mut vars = Map::new();
        vars.insert("CATALOG_TOKEN".to_string(), String::new());
        assert!(CatalogConfig::from_source(vars).unwrap().token.is_none());
    }
}
