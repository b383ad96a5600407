//! Backend trait for external provider implementations
//!
//! This module defines the internal abstraction for the upstream completion APIs.
//! Each backend handles the API-specific translation between our internal format
//! and the provider's native format.

use crate::{ChatCompletionParams, CompletionError, StreamingResult};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Response};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for a backend connection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for the provider API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: i64,
    /// Provider-specific extra configuration (e.g., organization_id)
    pub extra: HashMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_seconds: 120,
            extra: HashMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1) as u64)
    }
}

/// Internal backend trait for different API formats
///
/// Each backend implementation handles the translation between our standard
/// ChatCompletionParams format and the provider's native streaming format.
#[async_trait]
pub trait ExternalBackend: Send + Sync {
    /// Returns the backend type identifier (e.g., "openai_compatible", "mistral")
    fn backend_type(&self) -> &'static str;

    /// Name used in log lines and user-facing error text
    fn display_name(&self) -> &'static str;

    /// Performs a streaming chat completion request
    ///
    /// The backend is responsible for:
    /// - Translating ChatCompletionParams to provider-specific format
    /// - Making the HTTP request
    /// - Parsing the SSE response into normalized text deltas
    async fn chat_completion_stream(
        &self,
        config: &BackendConfig,
        model: &str,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError>;
}

/// Build the pooled HTTP client shared by every request of a provider
pub(crate) fn build_http_client() -> Result<Client, CompletionError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| CompletionError::CompletionError(format!("Failed to create HTTP client: {e}")))
}

/// POST a streaming request and hand back the response once the upstream accepted it
///
/// Non-2xx statuses become [`CompletionError::HttpError`] carrying the upstream's own message.
pub(crate) async fn send_streaming_request(
    client: &Client,
    config: &BackendConfig,
    headers: HeaderMap,
    body: &ChatCompletionParams,
) -> Result<Response, CompletionError> {
    let url = config.chat_completions_url();

    let response = client
        .post(&url)
        .headers(headers)
        .timeout(config.timeout())
        .json(body)
        .send()
        .await
        .map_err(|e| CompletionError::CompletionError(e.to_string()))?;

    if !response.status().is_success() {
        let status_code = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
        tracing::warn!(status_code, url = %url, "Upstream rejected completion request");
        return Err(CompletionError::HttpError {
            status_code,
            message: crate::extract_error_message(&error_text),
        });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_completions_url_strips_trailing_slash() {
        let config = BackendConfig {
            base_url: "https://api.mistral.ai/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.chat_completions_url(),
            "https://api.mistral.ai/v1/chat/completions"
        );
    }

    #[test]
    fn test_timeout_never_zero() {
        let config = BackendConfig {
            timeout_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(BackendConfig::default().timeout(), Duration::from_secs(120));
    }
}
