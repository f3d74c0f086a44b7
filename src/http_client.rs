//! HTTP client abstraction for external API communication.
//!
//! This module provides a trait-based abstraction over HTTP clients, enabling
//! dependency injection and easy mocking in tests. Responses carry the status
//! code so callers can tell a rate limit apart from other failures.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP communication with external APIs.
///
/// # Example
///
/// ```ignore
/// use idea_validator::http_client::{HttpClient, ReqwestHttpClient};
///
/// let client = ReqwestHttpClient::new();
/// let response = client.post_json(
///     "https://api.example.com/endpoint",
///     &[("Authorization", "Bearer key")],
///     &serde_json::json!({"key": "value"}),
/// ).await?;
/// assert!(response.is_success());
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error only when the request could not be sent or the body
    /// could not be read. Non-2xx statuses are returned as responses.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;
}

/// HTTP client implementation using reqwest.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = HttpResponse {
            status: 200,
            body: String::new(),
        };
        let created = HttpResponse {
            status: 201,
            body: String::new(),
        };
        let limited = HttpResponse {
            status: 429,
            body: String::new(),
        };

        assert!(ok.is_success());
        assert!(created.is_success());
        assert!(!limited.is_success());
    }
}
