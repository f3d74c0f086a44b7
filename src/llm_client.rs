use crate::error::{ValidatorError, ValidatorResult};
use crate::http_client::{HttpClient, HttpResponse};
use crate::provider_registry::ProviderConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Capabilities the hosted orchestration layer may use on our behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    WebSearch,
}

impl ToolCapability {
    pub fn describe(&self) -> &'static str {
        match self {
            ToolCapability::WebSearch => "web_search: search the web for real-time market signals",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub tools: Vec<ToolCapability>,
}

/// Client handle for one configured provider.
///
/// This is the single opaque `generate(prompt, tools, provider) -> text`
/// capability; everything behind it belongs to the hosted service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> ValidatorResult<String>;
}

/// Builds client handles for providers whose credential is available.
pub trait ClientFactory: Send + Sync {
    fn build(&self, provider: &ProviderConfig, api_key: &str) -> Result<Arc<dyn CompletionClient>>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client.
pub struct ChatCompletionClient {
    http: Arc<dyn HttpClient>,
    provider: ProviderConfig,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(http: Arc<dyn HttpClient>, provider: ProviderConfig, api_key: String) -> Self {
        Self {
            http,
            provider,
            api_key,
        }
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let params = &self.provider.params;
        let mut system = request.system.clone();
        if !request.tools.is_empty() {
            system.push_str("\n\nAvailable tools:");
            for tool in &request.tools {
                system.push_str("\n- ");
                system.push_str(tool.describe());
            }
        }

        json!({
            "model": self.provider.model_id,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": request.prompt }
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
            "frequency_penalty": params.frequency_penalty,
            "presence_penalty": params.presence_penalty,
        })
    }

    fn classify_failure(&self, response: &HttpResponse) -> ValidatorError {
        let message = extract_error_message(&response.body);
        let lowered = message.to_lowercase();

        if response.status == 429 || lowered.contains("rate limit") || lowered.contains("rate_limit") {
            ValidatorError::RateLimited {
                provider: self.provider.name.clone(),
                message,
            }
        } else {
            ValidatorError::Provider {
                provider: self.provider.name.clone(),
                message: format!("HTTP {}: {}", response.status, message),
            }
        }
    }
}

/// Pulls `error.message` out of an API error body, or returns the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    fn provider_name(&self) -> &str {
        &self.provider.name
    }

    async fn complete(&self, request: &CompletionRequest) -> ValidatorResult<String> {
        let body = self.build_request_body(request);
        let authorization = format!("Bearer {}", self.api_key);
        let headers = [
            ("Authorization", authorization.as_str()),
            ("content-type", "application/json"),
        ];

        info!("Calling {} ({})", self.provider.name, self.provider.model_id);
        let response = self
            .http
            .post_json(&self.provider.base_url, &headers, &body)
            .await
            .map_err(|e| ValidatorError::Provider {
                provider: self.provider.name.clone(),
                message: e.to_string(),
            })?;

        if !response.is_success() {
            let err = self.classify_failure(&response);
            warn!("{}", err);
            return Err(err);
        }

        debug!("{} response: {}", self.provider.name, response.body);
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&response.body).map_err(|e| ValidatorError::Provider {
                provider: self.provider.name.clone(),
                message: format!("unexpected response format: {}", e),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ValidatorError::Provider {
                provider: self.provider.name.clone(),
                message: "response contained no choices".to_string(),
            })
    }
}

/// Builds [`ChatCompletionClient`]s sharing one HTTP client.
pub struct HttpClientFactory {
    http: Arc<dyn HttpClient>,
}

impl HttpClientFactory {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, provider: &ProviderConfig, api_key: &str) -> Result<Arc<dyn CompletionClient>> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("credential {} is blank", provider.credential_key));
        }
        if !(provider.base_url.starts_with("https://") || provider.base_url.starts_with("http://")) {
            return Err(anyhow!(
                "provider '{}' has an invalid base_url: {}",
                provider.name,
                provider.base_url
            ));
        }

        Ok(Arc::new(ChatCompletionClient::new(
            self.http.clone(),
            provider.clone(),
            api_key.to_string(),
        )))
    }
}

/// Offline client returning a canned report.
pub struct MockCompletionClient {
    provider_name: String,
}

impl MockCompletionClient {
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
        }
    }

    pub fn mock_report(&self, prompt: &str) -> String {
        let idea = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Idea: "))
            .unwrap_or("your idea")
            .trim();

        format!(
            "# Validation Report: {idea}\n\
             \n\
             ## Scorecard\n\
             \n\
             **Overall score: 72/100**\n\
             \n\
             | Category | Score | Notes |\n\
             |---|---|---|\n\
             | Demand | 20/25 | Steady interest in forums and social posts |\n\
             | Competition | 15/25 | Several incumbents, few focused offerings |\n\
             | Timing | 19/25 | Tooling costs are falling |\n\
             | Feasibility | 18/25 | Buildable by a small team |\n\
             \n\
             ## Signals\n\
             \n\
             - \"I would pay for this if it saved me an hour a week\" (forum thread)\n\
             - \"Existing tools are too generic\" (social post)\n\
             - Rising search interest for related terms\n\
             \n\
             ## Recommendations\n\
             \n\
             - Interview ten potential customers before building\n\
             - Ship a landing page and measure sign-ups\n\
             - Narrow the first version to one niche\n\
             - Price early to validate willingness to pay\n\
             - Revisit the scorecard after the first month\n\
             \n\
             _Generated by {provider} (mock mode)_\n",
            idea = idea,
            provider = self.provider_name,
        )
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> ValidatorResult<String> {
        Ok(self.mock_report(&request.prompt))
    }
}

/// Builds [`MockCompletionClient`]s for every provider.
pub struct MockClientFactory;

impl ClientFactory for MockClientFactory {
    fn build(&self, provider: &ProviderConfig, _api_key: &str) -> Result<Arc<dyn CompletionClient>> {
        Ok(Arc::new(MockCompletionClient::new(&provider.name)))
    }
}
