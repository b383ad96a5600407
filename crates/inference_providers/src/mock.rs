//! Mock implementation of InferenceProvider for testing
//!
//! This module provides a mock provider that streams scripted responses
//! without requiring a real upstream API.

use crate::{
    ChatCompletionParams, CompletionError, MessageRole, StreamingResult, TextDelta,
};
use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;

/// Request matcher for conditional responses
#[derive(Clone, Debug)]
pub enum RequestMatcher {
    /// Match any request
    Any,
    /// Match requests whose last user message has exactly this content
    LastUserMessage(String),
    /// Match requests whose leading system message contains this text
    SystemPromptContains(String),
}

impl RequestMatcher {
    /// Check if this matcher matches the given parameters
    pub fn matches(&self, params: &ChatCompletionParams) -> bool {
        match self {
            Self::Any => true,
            Self::LastUserMessage(expected) => params
                .messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .is_some_and(|m| &m.content == expected),
            Self::SystemPromptContains(needle) => params
                .messages
                .first()
                .is_some_and(|m| m.role == MessageRole::System && m.content.contains(needle)),
        }
    }
}

#[derive(Clone, Debug)]
enum Ending {
    Complete,
    ErrorAfter(usize, CompletionError),
    StallAfter(usize),
}

/// Template for generating responses
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    steps: Vec<TextDelta>,
    ending: Ending,
}

impl ResponseTemplate {
    /// Stream the given content word by word (each fragment keeps its trailing space)
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self::from_fragments(content.split_inclusive(' ').map(str::to_string))
    }

    /// Stream exactly these fragments, in order
    pub fn from_fragments<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            steps: fragments.into_iter().map(TextDelta::text).collect(),
            ending: Ending::Complete,
        }
    }

    /// A stream that completes without producing any step
    pub fn empty() -> Self {
        Self::from_fragments(Vec::<String>::new())
    }

    /// Precede every fragment with an absent delta, like role or keep-alive chunks do
    pub fn with_heartbeats(mut self) -> Self {
        self.steps = self
            .steps
            .into_iter()
            .flat_map(|step| [TextDelta::absent(), step])
            .chain(std::iter::once(TextDelta::absent()))
            .collect();
        self
    }

    /// Fail the stream with `error` after the first `steps` scripted steps
    pub fn with_error_after(mut self, steps: usize, error: CompletionError) -> Self {
        self.ending = Ending::ErrorAfter(steps, error);
        self
    }

    /// Stop producing anything after the first `steps` scripted steps, without ending
    pub fn with_stall_after(mut self, steps: usize) -> Self {
        self.ending = Ending::StallAfter(steps);
        self
    }

    fn into_stream(self) -> StreamingResult {
        let steps = self.steps.into_iter().map(Ok);
        match self.ending {
            Ending::Complete => Box::pin(stream::iter(steps)),
            Ending::ErrorAfter(n, error) => Box::pin(
                stream::iter(steps.take(n)).chain(stream::once(async move { Err(error) })),
            ),
            Ending::StallAfter(n) => {
                Box::pin(stream::iter(steps.take(n)).chain(stream::pending()))
            }
        }
    }
}

/// Configuration for conditional responses
struct MockConfig {
    expectations: Vec<MockExpectation>,
    default_response: ResponseTemplate,
    error_override: Option<CompletionError>,
    last_params: Option<ChatCompletionParams>,
}

#[derive(Clone)]
struct MockExpectation {
    matcher: RequestMatcher,
    response: ResponseTemplate,
}

/// Builder for configuring a single expectation
pub struct MockExpectationBuilder {
    config: Arc<Mutex<MockConfig>>,
    matcher: RequestMatcher,
}

impl MockExpectationBuilder {
    /// Set the response for this expectation
    pub async fn respond_with(self, response: ResponseTemplate) {
        let mut config = self.config.lock().await;
        config.expectations.push(MockExpectation {
            matcher: self.matcher,
            response,
        });
    }
}

#[derive(Default)]
struct StreamCounters {
    calls: AtomicUsize,
    yielded: AtomicUsize,
    closed: AtomicUsize,
}

/// Stream wrapper that records what the consumer pulled and when it let go
struct TrackedStream {
    inner: StreamingResult,
    counters: Arc<StreamCounters>,
}

impl Stream for TrackedStream {
    type Item = Result<TextDelta, CompletionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(_)) = &poll {
            self.counters.yielded.fetch_add(1, Ordering::SeqCst);
        }
        poll
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock provider that implements InferenceProvider for testing
pub struct MockProvider {
    name: String,
    /// Configuration for conditional responses (thread-safe)
    config: Arc<Mutex<MockConfig>>,
    counters: Arc<StreamCounters>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_name("Mock")
    }

    /// Create a mock provider reporting the given display name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(Mutex::new(MockConfig {
                expectations: Vec::new(),
                default_response: ResponseTemplate::new("1. 2. 3."),
                error_override: None,
                last_params: None,
            })),
            counters: Arc::new(StreamCounters::default()),
        }
    }

    /// Add a conditional response for a specific matcher
    pub fn when(&self, matcher: RequestMatcher) -> MockExpectationBuilder {
        MockExpectationBuilder {
            config: self.config.clone(),
            matcher,
        }
    }

    /// Set the default response for requests that don't match any expectation
    pub async fn set_default_response(&self, response: ResponseTemplate) {
        let mut config = self.config.lock().await;
        config.default_response = response;
    }

    /// Make every open fail with `error` until cleared
    pub async fn set_error_override(&self, error: Option<CompletionError>) {
        let mut config = self.config.lock().await;
        config.error_override = error;
    }

    /// Number of times a stream was requested, including failed opens
    pub fn call_count(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Number of opened streams that have since been dropped by their consumer
    pub fn closed_streams(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Number of items consumers pulled across all streams
    pub fn yielded_items(&self) -> usize {
        self.counters.yielded.load(Ordering::SeqCst)
    }

    /// Parameters of the most recent request
    pub async fn last_params(&self) -> Option<ChatCompletionParams> {
        self.config.lock().await.last_params.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::InferenceProvider for MockProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);

        let response_template = {
            let mut config = self.config.lock().await;
            config.last_params = Some(params.clone());

            if let Some(error) = &config.error_override {
                return Err(error.clone());
            }

            config
                .expectations
                .iter()
                .find(|exp| exp.matcher.matches(&params))
                .map(|exp| exp.response.clone())
                .unwrap_or_else(|| config.default_response.clone())
        };

        Ok(Box::pin(TrackedStream {
            inner: response_template.into_stream(),
            counters: self.counters.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, CompletionParams, InferenceProvider};

    fn params(user: &str) -> ChatCompletionParams {
        ChatCompletionParams::new(
            vec![ChatMessage::system("You are a tutor"), ChatMessage::user(user)],
            &CompletionParams::default(),
        )
    }

    async fn fragments(provider: &MockProvider, user: &str) -> Vec<Result<Option<String>, CompletionError>> {
        let stream = provider.chat_completion_stream(params(user)).await.unwrap();
        stream
            .map(|item| item.map(TextDelta::into_fragment))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_default_response_streams_words() {
        let provider = MockProvider::new();
        let items = fragments(&provider, "hi").await;

        assert_eq!(
            items,
            vec![
                Ok(Some("1. ".to_string())),
                Ok(Some("2. ".to_string())),
                Ok(Some("3.".to_string()))
            ]
        );
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.closed_streams(), 1);
        assert_eq!(provider.yielded_items(), 3);
    }

    #[tokio::test]
    async fn test_matcher_selects_response() {
        let provider = MockProvider::new();
        provider
            .when(RequestMatcher::LastUserMessage("loop?".to_string()))
            .respond_with(ResponseTemplate::from_fragments(["Use for"]))
            .await;

        assert_eq!(fragments(&provider, "loop?").await, vec![Ok(Some("Use for".to_string()))]);
        assert_eq!(fragments(&provider, "other").await.len(), 3);
    }

    #[tokio::test]
    async fn test_heartbeats_and_error_after() {
        let provider = MockProvider::new();
        let error = CompletionError::ProviderError("overloaded".to_string());
        provider
            .set_default_response(
                ResponseTemplate::from_fragments(["a", "b"])
                    .with_heartbeats()
                    .with_error_after(2, error.clone()),
            )
            .await;

        let items = fragments(&provider, "x").await;
        assert_eq!(items, vec![Ok(None), Ok(Some("a".to_string())), Err(error)]);
    }

    #[tokio::test]
    async fn test_error_override_fails_open() {
        let provider = MockProvider::new();
        provider
            .set_error_override(Some(CompletionError::HttpError {
                status_code: 401,
                message: "Unauthorized".to_string(),
            }))
            .await;

        let result = provider.chat_completion_stream(params("x")).await;
        assert!(matches!(
            result,
            Err(CompletionError::HttpError { status_code: 401, .. })
        ));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_params().await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_stall_keeps_stream_open() {
        let provider = MockProvider::new();
        provider
            .set_default_response(ResponseTemplate::from_fragments(["a", "b"]).with_stall_after(1))
            .await;

        let mut stream = provider.chat_completion_stream(params("x")).await.unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap().fragment(),
            Some("a")
        );
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), stream.next()).await;
        assert!(next.is_err());

        drop(stream);
        assert_eq!(provider.closed_streams(), 1);
    }
}
