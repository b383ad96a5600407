#![allow(dead_code)]

use api::{build_app, AppState};
use inference_providers::{mock::ResponseTemplate, CompletionParams, MockProvider};
use serde_json::{json, Value};
use services::{
    inference::{InferenceServiceImpl, PromptProvider},
    metrics::capturing::CapturingMetricsService,
    prompts::StaticPromptProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const HELP_PATH: &str = "/llm-inference-stream";

/// A running app wired to a mock upstream
pub struct TestContext {
    pub server: axum_test::TestServer,
    pub provider: Arc<MockProvider>,
    pub metrics: Arc<CapturingMetricsService>,
    pub shutdown: CancellationToken,
}

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();
}

fn build_state(
    provider: Arc<MockProvider>,
    prompts: Arc<dyn PromptProvider>,
    metrics: Arc<CapturingMetricsService>,
    shutdown: CancellationToken,
) -> AppState {
    AppState {
        inference_service: Arc::new(InferenceServiceImpl::new(
            provider,
            prompts,
            CompletionParams::default(),
            metrics.clone(),
        )),
        metrics_service: metrics,
        shutdown,
    }
}

fn build_context(prompts: Arc<dyn PromptProvider>, http_transport: bool) -> TestContext {
    init_test_tracing();

    let provider = Arc::new(MockProvider::with_name("Mistral"));
    let metrics = Arc::new(CapturingMetricsService::new());
    let shutdown = CancellationToken::new();
    let app = build_app(build_state(
        provider.clone(),
        prompts,
        metrics.clone(),
        shutdown.clone(),
    ));

    let server = if http_transport {
        axum_test::TestServer::builder()
            .http_transport()
            .build(app)
            .unwrap()
    } else {
        axum_test::TestServer::new(app).unwrap()
    };

    TestContext {
        server,
        provider,
        metrics,
        shutdown,
    }
}

/// Setup a test server backed by the built-in prompts and a mock provider
pub fn setup_test_server() -> TestContext {
    build_context(Arc::new(StaticPromptProvider::new()), false)
}

/// Same as [`setup_test_server`] with a custom prompt source
pub fn setup_test_server_with_prompts(prompts: Arc<dyn PromptProvider>) -> TestContext {
    build_context(prompts, false)
}

/// Setup a test server listening on a real socket
pub fn setup_http_test_server() -> TestContext {
    build_context(Arc::new(StaticPromptProvider::new()), true)
}

impl TestContext {
    pub async fn respond_with(&self, response: ResponseTemplate) {
        self.provider.set_default_response(response).await;
    }

    /// POST a help request with the given raw query values
    pub async fn ask_help(
        &self,
        level_id: &str,
        language: &str,
        modality: &str,
        body: Value,
    ) -> axum_test::TestResponse {
        self.server
            .post(HELP_PATH)
            .add_query_param("level_id", level_id)
            .add_query_param("language", language)
            .add_query_param("modality", modality)
            .json(&body)
            .await
    }
}

pub fn help_body() -> Value {
    json!({
        "messages": [
            {"role": "user", "content": "<activities>\n<asked-help/>\n</activities>"}
        ]
    })
}

/// Split a response body into its frames, dropping the trailing separator
pub fn frames(body: &str) -> Vec<String> {
    body.split_terminator("\n\n").map(str::to_string).collect()
}
