//! Idea Validator - LLM-backed startup idea validation library.
//!
//! Takes a short description of a business idea, sends it to a hosted
//! language model as a three-agent "crew" and returns the markdown
//! validation report. Around that single call it provides:
//!
//! - **Provider fallback** over an ordered list of OpenAI-compatible APIs
//! - **Rate-limit retry** with a fixed delay schedule
//! - **Result caching** keyed by a hash of the normalized idea text
//! - **Submission throttling** with a session cap and a cooldown
//!
//! # Architecture
//!
//! - [`config`] - Configuration management (API keys, limits, providers)
//! - [`provider_registry`] - Provider list and fallback selection
//! - [`llm_client`] - Completion client handles and their factories
//! - [`job_runner`] - Builds the validation crew and runs it once
//! - [`retry`] - Rate-limit retry loop
//! - [`throttle`] - Session cap and cooldown
//! - [`result_cache`] - TTL cache of finished reports
//! - [`validator`] - The end-to-end flow for one submission
//! - [`report`] - Results and the downloadable report file
//! - [`shell`] - Terminal presentation shell
//! - [`providers`] - Shared dependency injection traits (time, sleep)
//! - [`http_client`] - HTTP client abstraction
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use idea_validator::config::Config;
//! use idea_validator::throttle::SessionState;
//! use idea_validator::validator::{IdeaValidator, ValidationOutcome};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let validator = IdeaValidator::from_config(&Config::load()?)?;
//!     let mut session = SessionState::new();
//!
//!     match validator.validate(&mut session, "An AI tool for personalized meal plans").await? {
//!         ValidationOutcome::Completed { result, .. } => println!("{}", result.report_text),
//!         ValidationOutcome::Throttled(rejection) => println!("{}", rejection.user_message()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http_client;
pub mod job_runner;
pub mod llm_client;
pub mod provider_registry;
pub mod providers;
pub mod report;
pub mod result_cache;
pub mod retry;
pub mod shell;
pub mod throttle;
pub mod validator;
