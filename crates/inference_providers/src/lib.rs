//! Inference providers crate for the upstream LLM completion APIs
//!
//! This crate provides a streaming-first trait interface over the chat completion
//! providers the relay can forward to, so the rest of the system never needs to know
//! which upstream is configured.
//!
//! # Streaming-First Design
//!
//! Opening a completion returns a lazy stream of [`TextDelta`] values. Each item is one
//! step of the upstream stream, normalized to an optional text fragment:
//!
//! - **Absent is not the end**: heartbeat or role-only chunks yield an absent delta
//! - **Errors are not swallowed**: transport, HTTP and in-band provider errors are
//!   stream items and reach the consumer, even after fragments were produced
//! - **Lazy**: nothing is pulled from the network until the consumer polls
//!
//! # Usage
//!
//! ```rust,ignore
//! use inference_providers::{ChatCompletionParams, CompletionParams, InferenceProvider};
//! use futures_util::StreamExt;
//!
//! async fn example<P: InferenceProvider>(provider: P) {
//!     let params = ChatCompletionParams::new(messages, &CompletionParams::default());
//!
//!     let mut stream = provider.chat_completion_stream(params).await?;
//!     while let Some(delta) = stream.next().await {
//!         match delta {
//!             Ok(delta) => {
//!                 if let Some(text) = delta.fragment() {
//!                     print!("{text}");
//!                 }
//!             }
//!             Err(e) => eprintln!("Stream error: {}", e),
//!         }
//!     }
//! }
//! ```

pub mod external;
pub mod mock;
pub mod models;
pub mod sse_parser;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

// Re-export commonly used types for convenience
pub use mock::MockProvider;
pub use models::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatDelta, ChatMessage,
    CompletionError, CompletionParams, MessageRole, TextDelta,
};
pub use sse_parser::{SSEEventParser, SSEParser};

// External provider exports
pub use external::{
    ExternalProvider, ExternalProviderConfig, MistralBackend, OpenAiCompatibleBackend,
    ProviderConfig,
};

/// Type alias for streaming completion results
///
/// Each item is either one normalized text delta (possibly absent) or the error that
/// interrupted the upstream stream.
pub type StreamingResult = Pin<Box<dyn Stream<Item = Result<TextDelta, CompletionError>> + Send>>;

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Human-readable provider name, used in logs and error messages only
    fn provider_name(&self) -> &str;

    /// Opens a streaming chat completion
    ///
    /// Returns a lazy stream of [`TextDelta`] items. An `Err` at open time means the
    /// upstream refused the request (e.g. authentication or quota failure); an `Err`
    /// item inside the stream means the upstream failed mid-generation.
    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError>;
}

const MAX_ERROR_BODY_LEN: usize = 500;

/// Extract a readable message from an upstream error body
///
/// Understands the OpenAI shape (`{"error": {"message": ...}}`), the Mistral shape
/// (`{"object": "error", "message": ...}`) and FastAPI-style `{"detail": ...}` bodies.
/// Anything else is returned verbatim, truncated.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json_error_message(&json) {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_BODY_LEN {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Find the error message in a JSON error document, if it is one
pub(crate) fn json_error_message(json: &serde_json::Value) -> Option<String> {
    // Any non-null error marks the document as a failure, with or without a message
    match json.get("error") {
        Some(serde_json::Value::Null) | None => {}
        Some(serde_json::Value::String(message)) => return Some(message.clone()),
        Some(error) => {
            return Some(
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            )
        }
    }
    if json.get("object").and_then(|o| o.as_str()) == Some("error") {
        if let Some(message) = json.get("message").and_then(|m| m.as_str()) {
            return Some(message.to_string());
        }
    }
    match json.get("detail") {
        Some(serde_json::Value::String(detail)) => Some(detail.clone()),
        Some(detail) if !detail.is_null() => Some(detail.to_string()),
        _ => None,
    }
}
