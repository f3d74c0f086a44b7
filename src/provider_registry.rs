//! Provider configuration and fallback selection.
//!
//! Providers are kept in a static list whose order is the fallback priority.
//! Selection walks the list and returns the first provider that has a
//! credential and whose client handle can be built.

use crate::error::{ValidatorError, ValidatorResult};
use crate::llm_client::{ClientFactory, CompletionClient};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2048,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model_id: String,
    /// Name of the credential (and environment variable) holding the API key.
    pub credential_key: String,
    pub base_url: String,
    #[serde(default)]
    pub params: GenerationParams,
}

/// The built-in provider list, highest priority first.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "groq".to_string(),
            model_id: "llama3-8b-8192".to_string(),
            credential_key: "GROQ_API_KEY".to_string(),
            base_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            params: GenerationParams::default(),
        },
        ProviderConfig {
            name: "openrouter".to_string(),
            model_id: "meta-llama/llama-3.1-8b-instruct:free".to_string(),
            credential_key: "OPENROUTER_API_KEY".to_string(),
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            params: GenerationParams {
                temperature: 0.2,
                ..GenerationParams::default()
            },
        },
        ProviderConfig {
            name: "together".to_string(),
            model_id: "meta-llama/Llama-3-8b-chat-hf".to_string(),
            credential_key: "TOGETHER_API_KEY".to_string(),
            base_url: "https://api.together.xyz/v1/chat/completions".to_string(),
            params: GenerationParams {
                temperature: 0.2,
                frequency_penalty: 0.1,
                presence_penalty: 0.1,
                ..GenerationParams::default()
            },
        },
    ]
}

/// API keys available at runtime, keyed by credential name.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, credential_key: &str, value: &str) {
        self.keys.insert(credential_key.to_string(), value.to_string());
    }

    /// Returns the credential when it is present and not blank.
    pub fn get(&self, credential_key: &str) -> Option<&str> {
        self.keys
            .get(credential_key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

impl FromIterator<(String, String)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// A provider paired with a ready-to-use client handle.
#[derive(Clone)]
pub struct SelectedProvider {
    pub config: ProviderConfig,
    pub client: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn no_providers_error(providers: &[ProviderConfig]) -> ValidatorError {
    let keys: Vec<&str> = providers.iter().map(|p| p.credential_key.as_str()).collect();
    ValidatorError::NoProvidersConfigured(keys.join(", "))
}

/// Fails when no provider in the list has a credential at all.
pub fn ensure_any_provider(providers: &[ProviderConfig], credentials: &Credentials) -> ValidatorResult<()> {
    if providers
        .iter()
        .any(|p| credentials.get(&p.credential_key).is_some())
    {
        Ok(())
    } else {
        Err(no_providers_error(providers))
    }
}

/// Returns the highest-priority provider with a usable client.
pub fn select_provider(
    providers: &[ProviderConfig],
    credentials: &Credentials,
    factory: &dyn ClientFactory,
) -> ValidatorResult<SelectedProvider> {
    select_provider_excluding(providers, credentials, factory, &HashSet::new())
}

/// Like [`select_provider`], but prefers providers not named in
/// `rate_limited`. When every available provider is rate limited the
/// highest-priority available one is returned again.
pub fn select_provider_excluding(
    providers: &[ProviderConfig],
    credentials: &Credentials,
    factory: &dyn ClientFactory,
    rate_limited: &HashSet<String>,
) -> ValidatorResult<SelectedProvider> {
    let mut fallback: Option<SelectedProvider> = None;

    for provider in providers {
        let Some(api_key) = credentials.get(&provider.credential_key) else {
            debug!("Skipping provider '{}': {} not set", provider.name, provider.credential_key);
            continue;
        };

        let client = match factory.build(provider, api_key) {
            Ok(client) => client,
            Err(e) => {
                warn!("Skipping provider '{}': {}", provider.name, e);
                continue;
            }
        };

        let selected = SelectedProvider {
            config: provider.clone(),
            client,
        };

        if !rate_limited.contains(&provider.name) {
            info!("Selected provider '{}' ({})", provider.name, provider.model_id);
            return Ok(selected);
        }

        if fallback.is_none() {
            fallback = Some(selected);
        }
    }

    match fallback {
        Some(selected) => {
            info!(
                "All available providers are rate limited, reusing '{}'",
                selected.config.name
            );
            Ok(selected)
        }
        None => Err(no_providers_error(providers)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockCompletionClient;
    use anyhow::{anyhow, Result};
    use std::sync::Mutex;

    /// Factory that records every build and can refuse named providers.
    struct RecordingFactory {
        broken: Vec<String>,
        built: Mutex<Vec<String>>,
    }

    impl RecordingFactory {
        fn new() -> Self {
            Self::with_broken(&[])
        }

        fn with_broken(broken: &[&str]) -> Self {
            Self {
                broken: broken.iter().map(|s| s.to_string()).collect(),
                built: Mutex::new(Vec::new()),
            }
        }

        fn built(&self) -> Vec<String> {
            self.built.lock().unwrap().clone()
        }
    }

    impl ClientFactory for RecordingFactory {
        fn build(&self, provider: &ProviderConfig, _api_key: &str) -> Result<Arc<dyn CompletionClient>> {
            self.built.lock().unwrap().push(provider.name.clone());
            if self.broken.contains(&provider.name) {
                return Err(anyhow!("cannot construct client"));
            }
            Ok(Arc::new(MockCompletionClient::new(&provider.name)))
        }
    }

    fn credentials(keys: &[&str]) -> Credentials {
        keys.iter()
            .map(|k| (k.to_string(), "secret".to_string()))
            .collect()
    }

    #[test]
    fn test_default_providers_order() {
        let names: Vec<String> = default_providers().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["groq", "openrouter", "together"]);
    }

    #[test]
    fn test_selects_highest_priority_available() {
        let providers = default_providers();
        let factory = RecordingFactory::new();

        let all = select_provider(
            &providers,
            &credentials(&["GROQ_API_KEY", "OPENROUTER_API_KEY", "TOGETHER_API_KEY"]),
            &factory,
        )
        .unwrap();
        assert_eq!(all.config.name, "groq");

        let lower = select_provider(
            &providers,
            &credentials(&["TOGETHER_API_KEY", "OPENROUTER_API_KEY"]),
            &factory,
        )
        .unwrap();
        assert_eq!(lower.config.name, "openrouter");
        assert_eq!(lower.client.provider_name(), "openrouter");
    }

    #[test]
    fn test_every_single_credential_selects_its_provider() {
        let providers = default_providers();
        for provider in &providers {
            let factory = RecordingFactory::new();
            let selected = select_provider(
                &providers,
                &credentials(&[provider.credential_key.as_str()]),
                &factory,
            )
            .unwrap();
            assert_eq!(selected.config, *provider);
        }
    }

    #[test]
    fn test_no_credentials_fails_without_building_clients() {
        let providers = default_providers();
        let factory = RecordingFactory::new();

        let err = select_provider(&providers, &Credentials::new(), &factory).unwrap_err();

        assert!(matches!(err, ValidatorError::NoProvidersConfigured(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
        assert!(factory.built().is_empty());
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let providers = default_providers();
        let mut creds = Credentials::new();
        creds.insert("GROQ_API_KEY", "  ");
        creds.insert("TOGETHER_API_KEY", "key");

        let selected = select_provider(&providers, &creds, &RecordingFactory::new()).unwrap();
        assert_eq!(selected.config.name, "together");
    }

    #[test]
    fn test_construction_failure_falls_through() {
        let providers = default_providers();
        let factory = RecordingFactory::with_broken(&["groq"]);

        let selected = select_provider(
            &providers,
            &credentials(&["GROQ_API_KEY", "TOGETHER_API_KEY"]),
            &factory,
        )
        .unwrap();

        assert_eq!(selected.config.name, "together");
        assert_eq!(factory.built(), vec!["groq", "together"]);
    }

    #[test]
    fn test_all_constructions_failing_is_configuration_error() {
        let providers = default_providers();
        let factory = RecordingFactory::with_broken(&["groq", "openrouter", "together"]);

        let err = select_provider(
            &providers,
            &credentials(&["GROQ_API_KEY", "OPENROUTER_API_KEY", "TOGETHER_API_KEY"]),
            &factory,
        )
        .unwrap_err();
        assert!(matches!(err, ValidatorError::NoProvidersConfigured(_)));
    }

    #[test]
    fn test_excluding_prefers_next_provider() {
        let providers = default_providers();
        let creds = credentials(&["GROQ_API_KEY", "OPENROUTER_API_KEY"]);
        let limited: HashSet<String> = ["groq".to_string()].into_iter().collect();

        let selected =
            select_provider_excluding(&providers, &creds, &RecordingFactory::new(), &limited).unwrap();
        assert_eq!(selected.config.name, "openrouter");
    }

    #[test]
    fn test_excluding_reuses_highest_priority_when_all_limited() {
        let providers = default_providers();
        let creds = credentials(&["GROQ_API_KEY", "OPENROUTER_API_KEY"]);
        let limited: HashSet<String> = ["groq".to_string(), "openrouter".to_string()]
            .into_iter()
            .collect();

        let selected =
            select_provider_excluding(&providers, &creds, &RecordingFactory::new(), &limited).unwrap();
        assert_eq!(selected.config.name, "groq");
    }

    #[test]
    fn test_ensure_any_provider() {
        let providers = default_providers();
        assert!(ensure_any_provider(&providers, &credentials(&["TOGETHER_API_KEY"])).is_ok());
        assert!(matches!(
            ensure_any_provider(&providers, &Credentials::new()),
            Err(ValidatorError::NoProvidersConfigured(_))
        ));
    }

    #[test]
    fn test_provider_config_params_default_when_missing_in_toml() {
        let provider: ProviderConfig = toml::from_str(
            r#"
            name = "local"
            model_id = "llama3"
            credential_key = "LOCAL_KEY"
            base_url = "http://localhost:8080/v1/chat/completions"
            "#,
        )
        .unwrap();

        assert_eq!(provider.params, GenerationParams::default());
    }
}
