use inference_providers::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Error body returned before any streaming starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable reason, e.g. "Invalid level_id"
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Help request context, sent as query parameters
///
/// Values are kept as strings here; anything that does not parse as an
/// integer is treated as missing and rejected by validation. When a key is
/// repeated, its first value is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InferenceQuery {
    /// Game level, 1 to 8
    pub level_id: Option<String>,
    /// Answer language, "EN" or "FR"
    pub language: Option<String>,
    /// Tutoring modality, 1 (free content) or 2 (guided)
    pub modality: Option<String>,
}

impl InferenceQuery {
    /// Build from decoded query pairs, in the order they appeared
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "level_id" => &mut query.level_id,
                "language" => &mut query.language,
                "modality" => &mut query.modality,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }

    pub fn level_id(&self) -> Option<i64> {
        parse_int(self.level_id.as_deref())
    }

    pub fn modality(&self) -> Option<i64> {
        parse_int(self.modality.as_deref())
    }
}

fn parse_int(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Body of a help request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InferenceRequestBody {
    /// Conversation so far; the last user message carries the activity log
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        ChatMessage {
            role: match message.role {
                Role::System => MessageRole::System,
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
            },
            content: message.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ints_are_lenient() {
        let query = InferenceQuery {
            level_id: Some(" 3 ".to_string()),
            language: Some("EN".to_string()),
            modality: Some("two".to_string()),
        };

        assert_eq!(query.level_id(), Some(3));
        assert_eq!(query.modality(), None);
        assert_eq!(InferenceQuery::default().level_id(), None);
    }

    #[test]
    fn test_first_value_wins_for_repeated_keys() {
        let pairs = [
            ("level_id", "1"),
            ("language", "EN"),
            ("modality", "1"),
            ("level_id", "2"),
            ("debug", "true"),
        ];
        let query =
            InferenceQuery::from_pairs(pairs.map(|(k, v)| (k.to_string(), v.to_string())));

        assert_eq!(query.level_id(), Some(1));
        assert_eq!(query.language.as_deref(), Some("EN"));
        assert_eq!(query.modality(), Some(1));
    }

    #[test]
    fn test_body_without_messages_is_empty() {
        let body: InferenceRequestBody = serde_json::from_str("{}").unwrap();
        assert!(body.messages.is_empty());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_str::<InferenceRequestBody>(
            r#"{"messages":[{"role":"tool","content":"x"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_message_conversion_keeps_content() {
        let message: ChatMessage = Message {
            role: Role::Assistant,
            content: "line\nbreak".to_string(),
        }
        .into();

        assert_eq!(message, ChatMessage::assistant("line\nbreak"));
    }
}
