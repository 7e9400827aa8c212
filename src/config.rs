//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`. A missing key is a valid,
//! handled state: the engine degrades to its neutral defaults.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub data_sources: DataSourcesConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// TTL for Trinity metrics cache entries, in minutes.
    #[serde(default = "default_trinity_ttl_mins")]
    pub trinity_cache_ttl_mins: i64,
    /// How many recent completed fixtures to use when deriving standings
    /// from form, and when summarising form for the context engine.
    #[serde(default = "default_form_window")]
    pub recent_form_window: u32,
}

fn default_trinity_ttl_mins() -> i64 {
    5
}

fn default_form_window() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourcesConfig {
    /// Env-var name holding the API-Football key.
    #[serde(default)]
    pub api_football_key_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Fallback model for OpenRouter (used when primary model fails).
    #[serde(default)]
    pub fallback_model: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_path: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

/// The two credentials the analysis pipeline can use. Either (or both)
/// may be absent; the pipeline must keep working in a degraded mode.
#[derive(Clone, Default)]
pub struct ApiCredentials {
    pub sports: Option<SecretString>,
    pub llm: Option<SecretString>,
}

impl ApiCredentials {
    /// Resolve both keys from the env-var names in the config.
    /// Unset variables resolve to `None`, never to an error.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let sports = cfg
            .data_sources
            .api_football_key_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .filter(|k| !k.is_empty())
            .map(SecretString::new);
        let llm = std::env::var(&cfg.llm.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .map(SecretString::new);
        Self { sports, llm }
    }

    /// Whether both keys are present (full Trinity analysis possible).
    pub fn is_complete(&self) -> bool {
        self.sports.is_some() && self.llm.is_some()
    }

    /// Names of the missing keys, for reasoning text.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.sports.is_none() {
            out.push("sports-data key");
        }
        if self.llm.is_none() {
            out.push("LLM key");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_src = r#"
            [engine]
            trinity_cache_ttl_mins = 10
            recent_form_window = 5

            [data_sources]
            api_football_key_env = "API_FOOTBALL_KEY"

            [llm]
            provider = "openrouter"
            model = "anthropic/claude-sonnet-4"
            api_key_env = "OPENROUTER_API_KEY"
            max_tokens = 1024

            [storage]
            database_path = "oracle.db"
        "#;
        let cfg: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.engine.trinity_cache_ttl_mins, 10);
        assert_eq!(cfg.llm.provider, "openrouter");
        assert!(cfg.llm.fallback_model.is_none());
        assert_eq!(cfg.storage.database_path, "oracle.db");
    }

    #[test]
    fn test_engine_defaults() {
        let toml_src = r#"
            [engine]

            [data_sources]

            [llm]
            provider = "openrouter"
            model = "anthropic/claude-sonnet-4"
            api_key_env = "OPENROUTER_API_KEY"
            max_tokens = 512

            [storage]
            database_path = "oracle.db"
        "#;
        let cfg: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.engine.trinity_cache_ttl_mins, 5);
        assert_eq!(cfg.engine.recent_form_window, 5);
        assert!(cfg.data_sources.api_football_key_env.is_none());
    }

    #[test]
    fn test_credentials_missing() {
        let creds = ApiCredentials::default();
        assert!(!creds.is_complete());
        let missing = creds.missing();
        assert_eq!(missing.len(), 2);
        assert!(missing.contains(&"sports-data key"));
        assert!(missing.contains(&"LLM key"));
    }

    #[test]
    fn test_credentials_complete() {
        let creds = ApiCredentials {
            sports: Some(SecretString::new("k1".into())),
            llm: Some(SecretString::new("k2".into())),
        };
        assert!(creds.is_complete());
        assert!(creds.missing().is_empty());
    }
}
