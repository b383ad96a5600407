pub mod ports;
pub mod relay;
pub mod validation;

use async_trait::async_trait;
use inference_providers::{ChatCompletionParams, ChatMessage, CompletionParams, InferenceProvider};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::{consts::*, tag, MetricsServiceTrait};

pub use ports::*;
pub use relay::{forward_frames, RelayStream, StreamOutcome, WireFrame, ERROR_PREFIX};

pub struct InferenceServiceImpl {
    provider: Arc<dyn InferenceProvider>,
    prompts: Arc<dyn PromptProvider>,
    completion: CompletionParams,
    metrics: Arc<dyn MetricsServiceTrait>,
}

impl InferenceServiceImpl {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        prompts: Arc<dyn PromptProvider>,
        completion: CompletionParams,
        metrics: Arc<dyn MetricsServiceTrait>,
    ) -> Self {
        Self {
            provider,
            prompts,
            completion,
            metrics,
        }
    }

    /// The system instruction goes first, followed by the caller's messages untouched
    fn forwarded_messages(system: ChatMessage, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut forwarded = Vec::with_capacity(messages.len() + 1);
        forwarded.push(system);
        forwarded.extend(messages);
        forwarded
    }
}

#[async_trait]
impl InferenceServiceTrait for InferenceServiceImpl {
    fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    async fn start_inference_stream(
        &self,
        level_id: Option<i64>,
        language: Option<String>,
        modality: Option<i64>,
        messages: Vec<ChatMessage>,
    ) -> Result<RelayStream, InferenceServiceError> {
        let provider_tag = tag(TAG_PROVIDER, self.provider.provider_name());
        self.metrics
            .record_count(METRIC_REQUEST_COUNT, 1, &[provider_tag.as_str()]);

        let request =
            match validation::validate(level_id, language.as_deref(), modality, messages) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(
                        reason = e.reason(),
                        ?level_id,
                        ?language,
                        ?modality,
                        "Rejected help request: {}",
                        e
                    );
                    let reason_tag = tag(TAG_REASON, e.reason());
                    self.metrics.record_count(
                        METRIC_VALIDATION_REJECTIONS,
                        1,
                        &[reason_tag.as_str()],
                    );
                    return Err(e.into());
                }
            };

        let request_id = Uuid::new_v4().to_string();
        let language_tag = tag(TAG_LANGUAGE, request.language);
        let modality_tag = tag(TAG_MODALITY, request.modality);
        let level_tag = tag(TAG_LEVEL, request.level);

        let system = match self
            .prompts
            .system_prompt(request.modality, request.level, request.language)
        {
            Ok(system) => system,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    "Failed to build system prompt: {}",
                    e
                );
                self.metrics.record_count(
                    METRIC_PRE_STREAM_ERRORS,
                    1,
                    &[
                        provider_tag.as_str(),
                        modality_tag.as_str(),
                        level_tag.as_str(),
                        language_tag.as_str(),
                    ],
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            request_id = %request_id,
            level = %request.level,
            language = %request.language,
            modality = %request.modality,
            messages = request.messages.len(),
            provider = self.provider.provider_name(),
            "Accepted help request"
        );

        let params = ChatCompletionParams::new(
            Self::forwarded_messages(system, request.messages),
            &self.completion,
        );

        Ok(RelayStream::new(
            self.provider.clone(),
            params,
            self.metrics.clone(),
            request_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::capturing::CapturingMetricsService;
    use crate::prompts::StaticPromptProvider;
    use futures::StreamExt;
    use inference_providers::{mock::ResponseTemplate, MessageRole, MockProvider};

    struct Harness {
        provider: Arc<MockProvider>,
        metrics: Arc<CapturingMetricsService>,
        service: InferenceServiceImpl,
    }

    fn harness_with_prompts(prompts: Arc<dyn PromptProvider>) -> Harness {
        let provider = Arc::new(MockProvider::new());
        let metrics = Arc::new(CapturingMetricsService::new());
        let service = InferenceServiceImpl::new(
            provider.clone(),
            prompts,
            CompletionParams::default(),
            metrics.clone(),
        );
        Harness {
            provider,
            metrics,
            service,
        }
    }

    fn harness() -> Harness {
        harness_with_prompts(Arc::new(StaticPromptProvider::new()))
    }

    fn help() -> Vec<ChatMessage> {
        vec![ChatMessage::user("<activities>asked-help</activities>")]
    }

    #[tokio::test]
    async fn test_rejected_request_never_reaches_provider() {
        let h = harness();

        let err = h
            .service
            .start_inference_stream(Some(9), Some("EN".to_string()), Some(1), help())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InferenceServiceError::Validation(ValidationError::InvalidLevel)
        ));
        assert_eq!(err.to_string(), "Invalid level_id");
        assert_eq!(h.provider.call_count(), 0);
        assert_eq!(
            h.metrics
                .count(METRIC_VALIDATION_REJECTIONS, Some("reason:invalid_level")),
            1
        );
    }

    #[tokio::test]
    async fn test_system_prompt_inserted_once_at_front() {
        let h = harness();
        h.provider
            .set_default_response(ResponseTemplate::new("Try a loop"))
            .await;

        let messages = vec![
            ChatMessage::system("caller system"),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ];
        let relay = h
            .service
            .start_inference_stream(Some(2), Some("FR".to_string()), Some(2), messages.clone())
            .await
            .unwrap();
        let frames: Vec<_> = relay.collect().await;
        assert!(!frames.is_empty());

        let params = h.provider.last_params().await.unwrap();
        assert_eq!(params.messages.len(), messages.len() + 1);
        assert_eq!(params.messages[0].role, MessageRole::System);
        assert!(params.messages[0].content.starts_with("# Identité:"));
        assert_eq!(&params.messages[1..], messages.as_slice());
        assert_eq!(params.stream, Some(true));
        assert_eq!(params.temperature, Some(0.3));
        assert_eq!(params.max_tokens, Some(500));
    }

    #[test]
    fn test_provider_name_comes_from_provider() {
        let h = harness();
        assert_eq!(h.service.provider_name(), "Mock");
    }

    #[tokio::test]
    async fn test_provider_opened_lazily() {
        let h = harness();

        let relay = h
            .service
            .start_inference_stream(Some(1), Some("EN".to_string()), Some(1), help())
            .await
            .unwrap();
        assert_eq!(h.provider.call_count(), 0);

        let _: Vec<_> = relay.collect().await;
        assert_eq!(h.provider.call_count(), 1);
        assert_eq!(h.metrics.count(METRIC_REQUEST_COUNT, None), 1);
    }

    #[tokio::test]
    async fn test_prompt_failure_is_pre_stream_error() {
        let mut prompts = MockPromptProvider::new();
        prompts
            .expect_system_prompt()
            .returning(|_, _, _| Err(PromptError::Unavailable("catalog missing".to_string())));
        let h = harness_with_prompts(Arc::new(prompts));

        let err = h
            .service
            .start_inference_stream(Some(4), Some("EN".to_string()), Some(2), help())
            .await
            .unwrap_err();

        assert!(matches!(err, InferenceServiceError::PreStream(_)));
        assert!(err.to_string().contains("catalog missing"));
        assert_eq!(h.provider.call_count(), 0);
        assert_eq!(h.metrics.count(METRIC_PRE_STREAM_ERRORS, None), 1);
    }

    #[tokio::test]
    async fn test_prompt_selected_from_request_context() {
        let mut prompts = MockPromptProvider::new();
        prompts
            .expect_system_prompt()
            .withf(|modality, level, language| {
                *modality == Modality::Guided && level.get() == 7 && *language == Language::En
            })
            .times(1)
            .returning(|_, _, _| Ok(ChatMessage::system("guided level 7")));
        let h = harness_with_prompts(Arc::new(prompts));

        let relay = h
            .service
            .start_inference_stream(Some(7), Some("EN".to_string()), Some(2), help())
            .await
            .unwrap();
        let _: Vec<_> = relay.collect().await;

        let params = h.provider.last_params().await.unwrap();
        assert_eq!(params.messages[0], ChatMessage::system("guided level 7"));
    }
}
