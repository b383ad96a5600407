use async_trait::async_trait;
use inference_providers::ChatMessage;
#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;
use std::fmt;

use super::relay::RelayStream;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 8;

// Domain types defined directly here (following dependency inversion)

/// Game level the help request was sent from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Level(u8);

impl Level {
    pub fn new(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| (MIN_LEVEL..=MAX_LEVEL).contains(v))
            .map(Level)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Level> {
        (MIN_LEVEL..=MAX_LEVEL).map(Level)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Fr,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Fr];

    /// Parses the exact codes the game client sends ("EN", "FR")
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "EN" => Some(Language::En),
            "FR" => Some(Language::Fr),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Fr => "FR",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Tutoring style selected by the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Modality "B" (id 1): free-content help
    FreeContent,
    /// Modality "C" (id 2): guided help
    Guided,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::FreeContent, Modality::Guided];

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Modality::FreeContent),
            2 => Some(Modality::Guided),
            _ => None,
        }
    }

    pub fn letter(self) -> &'static str {
        match self {
            Modality::FreeContent => "B",
            Modality::Guided => "C",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// A validated help request
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub level: Level,
    pub language: Language,
    pub modality: Modality,
    /// Caller-supplied conversation, never empty
    pub messages: Vec<ChatMessage>,
}

// Error types

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid level_id")]
    InvalidLevel,

    #[error("Invalid language")]
    InvalidLanguage,

    #[error("Invalid modality")]
    InvalidModality,

    #[error("Messages array is empty")]
    EmptyMessages,
}

impl ValidationError {
    /// Low-cardinality label for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::InvalidLevel => "invalid_level",
            ValidationError::InvalidLanguage => "invalid_language",
            ValidationError::InvalidModality => "invalid_modality",
            ValidationError::EmptyMessages => "empty_messages",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("No system prompt available for modality {modality}, level {level}, language {language}")]
    Empty {
        modality: Modality,
        level: Level,
        language: Language,
    },

    #[error("Prompt provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceServiceError {
    /// The request was rejected before anything was sent upstream
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request was valid but the response could not be set up
    #[error("{0}")]
    PreStream(String),
}

impl From<PromptError> for InferenceServiceError {
    fn from(error: PromptError) -> Self {
        InferenceServiceError::PreStream(error.to_string())
    }
}

// Port/Trait definitions (no implementations!)

/// Source of the system instruction prepended to every forwarded conversation
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
pub trait PromptProvider: Send + Sync {
    fn system_prompt(
        &self,
        modality: Modality,
        level: Level,
        language: Language,
    ) -> Result<ChatMessage, PromptError>;
}

#[async_trait]
pub trait InferenceServiceTrait: Send + Sync {
    /// Name of the upstream provider every request is relayed to
    fn provider_name(&self) -> &str;

    /// Validate the raw request values and prepare the relayed response
    ///
    /// Nothing is sent upstream until the returned relay is first polled.
    async fn start_inference_stream(
        &self,
        level_id: Option<i64>,
        language: Option<String>,
        modality: Option<i64>,
        messages: Vec<ChatMessage>,
    ) -> Result<RelayStream, InferenceServiceError>;
}
