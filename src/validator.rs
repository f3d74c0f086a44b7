//! End-to-end validation flow for one submission.
//!
//! blank check → throttle → record submission → cache → retry loop
//! (select provider, run crew) → cache store.

use crate::config::{CacheConfig, Config};
use crate::error::{ValidatorError, ValidatorResult};
use crate::http_client::ReqwestHttpClient;
use crate::job_runner::run_validation_job;
use crate::llm_client::{ClientFactory, HttpClientFactory, MockClientFactory};
use crate::provider_registry::{ensure_any_provider, select_provider_excluding, Credentials, ProviderConfig};
use crate::providers::{Sleeper, SystemTimeProvider, TimeProvider, TokioSleeper};
use crate::report::{ValidationRequest, ValidationResult};
use crate::result_cache::{cache_key, InMemoryResultCache, ResultCache};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::throttle::{check_submission, SessionState, SubmissionDecision, ThrottleConfig, ThrottleRejection};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Completed { result: ValidationResult, cached: bool },
    Throttled(ThrottleRejection),
}

pub struct IdeaValidator {
    providers: Vec<ProviderConfig>,
    credentials: Credentials,
    factory: Arc<dyn ClientFactory>,
    cache: Arc<dyn ResultCache>,
    retry: RetryPolicy,
    throttle: ThrottleConfig,
    sleeper: Arc<dyn Sleeper>,
    time_provider: Arc<dyn TimeProvider>,
}

impl IdeaValidator {
    /// Builds a validator from loaded configuration.
    ///
    /// # Errors
    ///
    /// [`ValidatorError::NoProvidersConfigured`] when no provider has a
    /// credential; nothing can be submitted in that state.
    pub fn from_config(config: &Config) -> ValidatorResult<Self> {
        let factory: Arc<dyn ClientFactory> = if config.is_mock_mode() {
            info!("Using mock providers ({}=1)", crate::config::MOCK_ENV_VAR);
            Arc::new(MockClientFactory)
        } else {
            Arc::new(HttpClientFactory::new(Arc::new(ReqwestHttpClient::new())))
        };

        let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let cache = Arc::new(InMemoryResultCache::with_time_provider(
            config.cache.ttl_secs,
            time_provider.clone(),
        ));

        IdeaValidator::builder(config.providers.clone(), config.effective_credentials(), factory)
            .cache(cache)
            .retry(config.retry.clone())
            .throttle(config.throttle.clone())
            .time_provider(time_provider)
            .build()
    }

    pub fn builder(
        providers: Vec<ProviderConfig>,
        credentials: Credentials,
        factory: Arc<dyn ClientFactory>,
    ) -> IdeaValidatorBuilder {
        IdeaValidatorBuilder {
            providers,
            credentials,
            factory,
            cache: None,
            retry: RetryPolicy::default(),
            throttle: ThrottleConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn throttle_config(&self) -> &ThrottleConfig {
        &self.throttle
    }

    /// Validates one idea for `session`.
    ///
    /// Throttle rejections come back as [`ValidationOutcome::Throttled`] and
    /// leave the session untouched. Accepted submissions are recorded on the
    /// session before any provider is called.
    pub async fn validate(&self, session: &mut SessionState, idea: &str) -> ValidatorResult<ValidationOutcome> {
        let request = ValidationRequest {
            idea_text: idea.trim().to_string(),
            submitted_at: self.time_provider.now(),
        };
        if request.idea_text.is_empty() {
            return Err(ValidatorError::EmptyIdea);
        }

        if let SubmissionDecision::Rejected(rejection) =
            check_submission(session, &self.throttle, request.submitted_at)
        {
            info!("Submission throttled: {}", rejection.user_message());
            return Ok(ValidationOutcome::Throttled(rejection));
        }
        session.record_submission(request.submitted_at);

        let key = cache_key(&request.idea_text);
        if let Some(result) = self.cache.get(&key) {
            return Ok(ValidationOutcome::Completed { result, cached: true });
        }

        let result = self.run_with_fallback(&request.idea_text).await?;
        self.cache.put(&key, result.clone());
        Ok(ValidationOutcome::Completed { result, cached: false })
    }

    async fn run_with_fallback(&self, idea: &str) -> ValidatorResult<ValidationResult> {
        let rate_limited = Mutex::new(HashSet::new());
        let rate_limited = &rate_limited;

        run_with_retry(&self.retry, self.sleeper.as_ref(), move |attempt| async move {
            let limited = lock_history(rate_limited).clone();
            let selected =
                select_provider_excluding(&self.providers, &self.credentials, self.factory.as_ref(), &limited)?;
            info!("Attempt {} using provider '{}'", attempt, selected.config.name);

            match run_validation_job(selected.client.as_ref(), idea).await {
                Ok(report_text) => Ok(ValidationResult {
                    report_text,
                    produced_by: selected.config.name,
                }),
                Err(e) => {
                    if e.is_rate_limited() {
                        lock_history(rate_limited).insert(selected.config.name.clone());
                    } else {
                        warn!("Provider '{}' failed: {}", selected.config.name, e);
                    }
                    Err(e)
                }
            }
        })
        .await
    }
}

pub struct IdeaValidatorBuilder {
    providers: Vec<ProviderConfig>,
    credentials: Credentials,
    factory: Arc<dyn ClientFactory>,
    cache: Option<Arc<dyn ResultCache>>,
    retry: RetryPolicy,
    throttle: ThrottleConfig,
    sleeper: Arc<dyn Sleeper>,
    time_provider: Arc<dyn TimeProvider>,
}

impl IdeaValidatorBuilder {
    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn build(self) -> ValidatorResult<IdeaValidator> {
        ensure_any_provider(&self.providers, &self.credentials)?;

        let cache: Arc<dyn ResultCache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(InMemoryResultCache::with_time_provider(
                CacheConfig::default().ttl_secs,
                self.time_provider.clone(),
            )),
        };

        Ok(IdeaValidator {
            providers: self.providers,
            credentials: self.credentials,
            factory: self.factory,
            cache,
            retry: self.retry,
            throttle: self.throttle,
            sleeper: self.sleeper,
            time_provider: self.time_provider,
        })
    }
}

/// Rate-limit history for one request. A poisoned lock still holds a
/// usable set, so it is recovered rather than dropped.
fn lock_history(history: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
