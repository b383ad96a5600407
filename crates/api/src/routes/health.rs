use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json as ResponseJson};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Relay version
    pub version: String,
    /// Upstream provider help requests are relayed to
    pub provider: String,
}

/// Health check endpoint
///
/// Reports liveness and the configured provider; the provider is not contacted.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(app_state): State<AppState>,
) -> (StatusCode, ResponseJson<HealthResponse>) {
    (
        StatusCode::OK,
        ResponseJson(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: app_state.inference_service.provider_name().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_providers::{CompletionParams, MockProvider};
    use services::{
        inference::InferenceServiceImpl, metrics::capturing::CapturingMetricsService,
        prompts::StaticPromptProvider,
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_health_check_reports_provider() {
        let metrics = Arc::new(CapturingMetricsService::new());
        let state = AppState {
            inference_service: Arc::new(InferenceServiceImpl::new(
                Arc::new(MockProvider::with_name("LLM")),
                Arc::new(StaticPromptProvider::new()),
                CompletionParams::default(),
                metrics.clone(),
            )),
            metrics_service: metrics,
            shutdown: CancellationToken::new(),
        };

        let (status, ResponseJson(response)) = health_check(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.provider, "LLM");
    }
}
