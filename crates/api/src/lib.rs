pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;

use crate::{
    middleware::{http_metrics_middleware, MetricsState},
    openapi::ApiDoc,
    routes::{health_check, llm_inference_stream},
};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    response::Html,
    routing::{get, post},
    Router,
};
use config::{ApiConfig, LlmApi, LlmConfig, SamplingConfig, TelemetryConfig};
use inference_providers::{
    CompletionParams, ExternalProvider, ExternalProviderConfig, InferenceProvider, ProviderConfig,
};
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};
use services::{
    inference::{InferenceServiceImpl, InferenceServiceTrait},
    metrics::{MetricsServiceTrait, OtlpMetricsService},
    prompts::StaticPromptProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

const METER_NAME: &str = "tutor-relay";

/// Largest accepted help request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub inference_service: Arc<dyn InferenceServiceTrait>,
    pub metrics_service: Arc<dyn MetricsServiceTrait>,
    /// Cancelled once on shutdown; every open stream watches a child token
    pub shutdown: CancellationToken,
}

/// Initialize the meter provider and the metrics service on top of it
///
/// Metrics are exported over OTLP only when an endpoint is configured;
/// otherwise they are recorded and dropped in-process.
pub fn init_metrics(
    config: &TelemetryConfig,
) -> anyhow::Result<(Arc<dyn MetricsServiceTrait>, SdkMeterProvider)> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let mut builder = SdkMeterProvider::builder().with_resource(resource);

    if let Some(endpoint) = &config.otlp_endpoint {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .context("Failed to create OTLP metric exporter")?;

        builder = builder.with_reader(PeriodicReader::builder(exporter).build());
        tracing::info!(endpoint = %endpoint, "Exporting metrics over OTLP");
    } else {
        tracing::info!("No OTLP endpoint configured, metrics are not exported");
    }

    let meter_provider = builder.build();
    opentelemetry::global::set_meter_provider(meter_provider.clone());

    let metrics_service: Arc<dyn MetricsServiceTrait> =
        Arc::new(OtlpMetricsService::new(meter_provider.meter(METER_NAME)));

    Ok((metrics_service, meter_provider))
}

/// Map the configured API family onto a provider backend
pub fn provider_config(config: &LlmConfig) -> anyhow::Result<ProviderConfig> {
    match config.api {
        LlmApi::OpenAi => Ok(ProviderConfig::OpenAiCompatible {
            base_url: config
                .url
                .clone()
                .context("LLM_URL is required for OpenAI-compatible providers")?,
            organization_id: config.organization_id.clone(),
        }),
        LlmApi::Mistral => Ok(ProviderConfig::Mistral {
            base_url: config.url.clone(),
        }),
    }
}

/// Initialize the single upstream provider used for every request
pub fn init_inference_provider(config: &LlmConfig) -> anyhow::Result<Arc<dyn InferenceProvider>> {
    let provider = ExternalProvider::new(ExternalProviderConfig {
        model_name: config.model.clone(),
        provider_config: provider_config(config)?,
        api_key: config.api_key.clone(),
        timeout_seconds: config.timeout_seconds,
    })
    .context("Failed to create inference provider")?;

    Ok(Arc::new(provider))
}

pub fn completion_params(sampling: &SamplingConfig) -> CompletionParams {
    CompletionParams {
        temperature: sampling.temperature,
        max_tokens: sampling.max_tokens,
        top_p: sampling.top_p,
        presence_penalty: sampling.presence_penalty,
        frequency_penalty: sampling.frequency_penalty,
    }
}

/// Initialize the inference service with the built-in prompts
pub fn init_inference_service(
    config: &ApiConfig,
    provider: Arc<dyn InferenceProvider>,
    metrics_service: Arc<dyn MetricsServiceTrait>,
) -> Arc<InferenceServiceImpl> {
    Arc::new(InferenceServiceImpl::new(
        provider,
        Arc::new(StaticPromptProvider::new()),
        completion_params(&config.sampling),
        metrics_service,
    ))
}

/// Build the complete application router
pub fn build_app(app_state: AppState) -> Router {
    let metrics_state = MetricsState {
        metrics_service: app_state.metrics_service.clone(),
    };

    build_inference_routes(app_state)
        .merge(build_openapi_routes())
        .route_layer(from_fn_with_state(metrics_state, http_metrics_middleware))
        // The game client is served from other origins
        .layer(CorsLayer::permissive())
}

/// Build the help request and health routes
pub fn build_inference_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/llm-inference-stream",
            post(llm_inference_stream).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/health", get(health_check))
        .with_state(app_state)
}

/// Build OpenAPI documentation routes
pub fn build_openapi_routes() -> Router {
    Router::new().route("/docs", get(swagger_ui_handler)).route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

/// Serve Swagger UI HTML page
async fn swagger_ui_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Tutor Relay API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.10.5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.10.5/swagger-ui-bundle.js"></script>
    <script>
    window.onload = function() {
        SwaggerUIBundle({
            url: '/api-docs/openapi.json',
            dom_id: '#swagger-ui',
            deepLinking: true,
        });
    };
    </script>
</body>
</html>"#,
    )
}
