//! Error taxonomy for the validation pipeline.
//!
//! Throttle rejections are not errors; see [`crate::throttle`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    /// No provider has a usable credential. Fatal, never retried.
    #[error("No LLM provider is configured. Set one of: {0}")]
    NoProvidersConfigured(String),

    #[error("Please enter an idea to validate.")]
    EmptyIdea,

    #[error("Provider '{provider}' is rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// Unclassified API or network failure.
    #[error("Provider '{provider}' request failed: {message}")]
    Provider { provider: String, message: String },

    #[error(
        "All {attempts} attempts were rate limited (last provider: '{provider}'). \
         Wait a few minutes and try again."
    )]
    RetriesExhausted { attempts: u32, provider: String },
}

impl ValidatorError {
    /// Only rate-limit failures are eligible for retry.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ValidatorError::RateLimited { .. })
    }
}

pub type ValidatorResult<T> = std::result::Result<T, ValidatorError>;
