//! Mistral backend implementation
//!
//! Mistral streams OpenAI-shaped chunks, except that `delta.content` is either a
//! plain string or a list of typed content chunks (`text`, `thinking`, ...).
//! Only `text` chunks carry answer text.

use super::backend::{send_streaming_request, BackendConfig, ExternalBackend};
use crate::{
    json_error_message, sse_parser::SSEEventParser, ChatCompletionParams, CompletionError,
    SSEParser, StreamingResult, TextDelta,
};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client};
use serde::Deserialize;

pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

#[derive(Debug, Deserialize)]
struct MistralChunk {
    #[serde(default)]
    choices: Vec<MistralChoice>,
}

#[derive(Debug, Deserialize)]
struct MistralChoice {
    #[serde(default)]
    delta: Option<MistralDelta>,
}

#[derive(Debug, Deserialize)]
struct MistralDelta {
    #[serde(default)]
    content: Option<MistralContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MistralContent {
    Text(String),
    Chunks(Vec<ContentChunk>),
}

#[derive(Debug, Deserialize)]
struct ContentChunk {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl MistralContent {
    fn into_text(self) -> Option<String> {
        match self {
            MistralContent::Text(text) => Some(text),
            MistralContent::Chunks(chunks) => {
                let text: String = chunks
                    .into_iter()
                    .filter(|chunk| chunk.kind.as_deref().unwrap_or("text") == "text")
                    .filter_map(|chunk| chunk.text)
                    .collect();
                Some(text)
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MistralChunkParser;

impl SSEEventParser for MistralChunkParser {
    fn parse_event(&mut self, data: &str) -> Result<TextDelta, CompletionError> {
        let json: serde_json::Value = serde_json::from_str(data).map_err(|e| {
            CompletionError::InvalidResponse(format!("Invalid JSON in SSE event: {e}"))
        })?;

        if let Some(message) = json_error_message(&json) {
            return Err(CompletionError::ProviderError(message));
        }

        let chunk: MistralChunk = serde_json::from_value(json)
            .map_err(|e| CompletionError::InvalidResponse(format!("Invalid Mistral chunk: {e}")))?;

        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .and_then(MistralContent::into_text)
            .into())
    }
}

pub struct MistralBackend {
    client: Client,
}

impl MistralBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn build_headers(&self, config: &BackendConfig) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("text/event-stream"));

        let header_value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| format!("Invalid API key format: {e}"))?;
        headers.insert("Authorization", header_value);

        Ok(headers)
    }
}

#[async_trait]
impl ExternalBackend for MistralBackend {
    fn backend_type(&self) -> &'static str {
        "mistral"
    }

    fn display_name(&self) -> &'static str {
        "Mistral"
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

        Ok(Box::pin(SSEParser::new(
            response.bytes_stream(),
            MistralChunkParser,
        )))
    }
}
