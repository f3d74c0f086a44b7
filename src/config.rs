use crate::provider_registry::{default_providers, Credentials, ProviderConfig};
use crate::retry::RetryPolicy;
use crate::throttle::ThrottleConfig;
use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MOCK_ENV_VAR: &str = "IDEA_VALIDATOR_USE_MOCK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub use_mock: bool,
    /// API keys keyed by provider credential name.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_mock: false,
            api_keys: BTreeMap::new(),
            throttle: ThrottleConfig::default(),
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables, or defaults
    /// when no file exists. Use for running validations, never for saving.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file_or_default()?;

        // Environment variables override config file
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load only what is on disk. This is the config to edit and save back.
    pub fn load_file_or_default() -> Result<Self> {
        Self::load_path_or_default(&Self::get_config_path()?)
    }

    /// Defaults when `config_path` is absent; parse errors are returned.
    pub fn load_path_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from_path(config_path)
        } else {
            info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Overrides credentials and mock mode from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &self.providers {
            if let Some(value) = lookup(&provider.credential_key) {
                self.api_keys.insert(provider.credential_key.clone(), value);
            }
        }

        if lookup(MOCK_ENV_VAR).is_some() {
            self.use_mock = true;
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?;
            config.validate()?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.retry.is_non_decreasing() {
            return Err(anyhow!(
                "retry.delays_secs must be non-decreasing, got {:?}",
                self.retry.delays_secs
            ));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".idea-validator"))
    }

    /// Records an API key for a known credential name. Does not save.
    pub fn set_api_key(&mut self, credential_key: &str, api_key: String) -> Result<()> {
        if !self.providers.iter().any(|p| p.credential_key == credential_key) {
            return Err(anyhow!(
                "Unknown credential '{}'. Expected one of: {}",
                credential_key,
                self.credential_keys().join(", ")
            ));
        }
        self.api_keys.insert(credential_key.to_string(), api_key);
        info!("API key set for {}", credential_key);
        Ok(())
    }

    pub fn credential_keys(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.credential_key.as_str()).collect()
    }

    pub fn credentials(&self) -> Credentials {
        self.api_keys
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// In mock mode every provider gets a placeholder credential.
    pub fn effective_credentials(&self) -> Credentials {
        if !self.use_mock {
            return self.credentials();
        }

        let mut credentials = self.credentials();
        for provider in &self.providers {
            if credentials.get(&provider.credential_key).is_none() {
                credentials.insert(&provider.credential_key, "mock");
            }
        }
        credentials
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
        } else {
            println!("Status: Not found (using defaults)");
        }

        let config = Self::load()?;
        let credentials = config.credentials();
        println!("\nProviders (in fallback order):");
        for provider in &config.providers {
            let status = if credentials.get(&provider.credential_key).is_some() {
                "Set"
            } else {
                "Not set"
            };
            println!(
                "  {} ({}) - {}: {}",
                provider.name, provider.model_id, provider.credential_key, status
            );
        }
        println!("Mock mode: {}", config.use_mock);
        println!(
            "Session limit: {}, cooldown: {}s, cache TTL: {}s",
            config.throttle.session_limit, config.throttle.cooldown_secs, config.cache.ttl_secs
        );

        println!("\nTo set an API key:");
        println!("  validate --set-api-key GROQ_API_KEY <your-key>");
        println!("\nOr set environment variable:");
        println!("  export GROQ_API_KEY=<your-key>");

        Ok(())
    }
}
