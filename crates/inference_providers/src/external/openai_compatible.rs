//! OpenAI-compatible backend implementation
//!
//! This backend handles any provider that speaks OpenAI's chat completion format
//! (OpenAI itself, self-hosted gateways, vLLM, Ollama, ...). The text of each
//! stream step lives at `choices[0].delta.content`.

use super::backend::{send_streaming_request, BackendConfig, ExternalBackend};
use crate::{
    json_error_message, sse_parser::SSEEventParser, ChatCompletionChunk, ChatCompletionParams,
    CompletionError, SSEParser, StreamingResult, TextDelta,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};

/// OpenAI-compatible backend
///
/// Provides a pass-through implementation for providers that implement OpenAI's API format.
pub struct OpenAiCompatibleBackend {
    client: Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn build_headers(&self, config: &BackendConfig) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("text/event-stream"));

        // Authorization header
        let auth_value = format!("Bearer {}", config.api_key);
        let header_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| format!("Invalid API key format: {e}"))?;
        headers.insert("Authorization", header_value);

        // OpenAI organization header (if provided)
        if let Some(org_id) = config.extra.get("organization_id") {
            if let Ok(value) = HeaderValue::from_str(org_id) {
                headers.insert("OpenAI-Organization", value);
            }
        }

        Ok(headers)
    }
}

/// Extracts `choices[0].delta.content` from OpenAI-format chunks
#[derive(Debug, Default)]
pub(crate) struct OpenAiChunkParser;

impl SSEEventParser for OpenAiChunkParser {
    fn parse_event(&mut self, data: &str) -> Result<TextDelta, CompletionError> {
        let json: serde_json::Value = serde_json::from_str(data).map_err(|e| {
            CompletionError::InvalidResponse(format!("Invalid JSON in SSE event: {e}"))
        })?;

        // Gateways report mid-stream failures as an error object in a data line
        if let Some(message) = json_error_message(&json) {
            return Err(CompletionError::ProviderError(message));
        }

        let chunk: ChatCompletionChunk = serde_json::from_value(json)
            .map_err(|e| CompletionError::InvalidResponse(format!("Invalid chat chunk: {e}")))?;

        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .into())
    }
}

#[async_trait]
impl ExternalBackend for OpenAiCompatibleBackend {
    fn backend_type(&self) -> &'static str {
        "openai_compatible"
    }

    fn display_name(&self) -> &'static str {
        "LLM"
    }

    async fn chat_completion_stream(
        &self,
        config: &BackendConfig,
        model: &str,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        let mut streaming_params = params;
        streaming_params.model = model.to_string();
        streaming_params.stream = Some(true);

        let headers = self
            .build_headers(config)
            .map_err(CompletionError::CompletionError)?;

        let response =
            send_streaming_request(&self.client, config, headers, &streaming_params).await?;

        let sse_stream = SSEParser::new(response.bytes_stream(), OpenAiChunkParser);
        Ok(Box::pin(sse_stream))
    }
}
