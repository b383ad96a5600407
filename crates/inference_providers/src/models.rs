use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Sampling parameters shared by every request of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    /// Sampling temperature between 0 and 2
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_tokens: i64,
    /// Nucleus sampling parameter (0-1)
    pub top_p: f32,
    /// Presence penalty (-2.0 to 2.0)
    pub presence_penalty: f32,
    /// Frequency penalty (-2.0 to 2.0)
    pub frequency_penalty: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
            top_p: 0.9,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

/// Request body for streaming chat completions
///
/// Both supported upstream APIs accept this body as-is; the backend fills in
/// `model` and forces `stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionParams {
    /// Model ID to use for the completion
    pub model: String,

    /// List of messages comprising the conversation so far
    pub messages: Vec<ChatMessage>,

    /// Whether to stream back partial progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Sampling temperature between 0 and 2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,

    /// Nucleus sampling parameter (0-1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Presence penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Frequency penalty (-2.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl ChatCompletionParams {
    /// Build a streaming request from the conversation and the process-wide sampling values
    pub fn new(messages: Vec<ChatMessage>, completion: &CompletionParams) -> Self {
        Self {
            model: String::new(),
            messages,
            stream: Some(true),
            temperature: Some(completion.temperature),
            max_tokens: Some(completion.max_tokens),
            top_p: Some(completion.top_p),
            presence_penalty: Some(completion.presence_penalty),
            frequency_penalty: Some(completion.frequency_penalty),
        }
    }
}

/// One normalized step of an upstream completion stream
///
/// An absent delta means "no text this tick" (role announcements, heartbeats,
/// finish chunks). It is not an error and not the end of the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDelta(Option<String>);

impl TextDelta {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn text(fragment: impl Into<String>) -> Self {
        Self(Some(fragment.into()))
    }

    /// The text fragment, if this step carried a non-empty one
    pub fn fragment(&self) -> Option<&str> {
        self.0.as_deref().filter(|s| !s.is_empty())
    }

    pub fn into_fragment(self) -> Option<String> {
        self.0.filter(|s| !s.is_empty())
    }

    pub fn is_absent(&self) -> bool {
        self.fragment().is_none()
    }
}

impl From<Option<String>> for TextDelta {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

/// Chat completion streaming chunk (OpenAI format)
///
/// Every field is optional on the wire; compatible servers omit freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Unique identifier for the completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Model used for the completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// List of completion choices
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// Choice in a chat completion chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index
    #[serde(default)]
    pub index: i64,

    /// Incremental message delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChatDelta>,

    /// Reason why generation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta message in streaming chat completions
/// All fields are optional as they may not be present in every chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("{0}")]
    CompletionError(String),
    #[error("HTTP {status_code}: {message}")]
    HttpError { status_code: u16, message: String },
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_serialization_matches_upstream_body() {
        let params = ChatCompletionParams::new(
            vec![ChatMessage::system("Be a tutor"), ChatMessage::user("help")],
            &CompletionParams::default(),
        );
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "help");
        assert!((json["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!((json["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(json["presence_penalty"], 0.0);
        assert_eq!(json["frequency_penalty"], 0.0);
    }

    #[test]
    fn test_text_delta_empty_is_absent() {
        assert!(TextDelta::absent().is_absent());
        assert!(TextDelta::text("").is_absent());
        assert_eq!(TextDelta::text("hi").fragment(), Some("hi"));
        assert_eq!(TextDelta::from(None).into_fragment(), None);
    }

    #[test]
    fn test_chunk_deserialization_tolerates_missing_fields() {
        let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert_eq!(chunk.choices.len(), 1);
        assert!(chunk.choices[0].delta.as_ref().unwrap().content.is_none());

        let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(chunk.choices.is_empty());
    }

    #[test]
    fn test_message_role_rejects_unknown() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"x"}"#);
        assert!(result.is_err());
    }
}
