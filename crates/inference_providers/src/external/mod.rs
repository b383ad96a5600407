//! External provider module for the upstream completion APIs
//!
//! This module provides a unified `ExternalProvider` that hides the configured
//! upstream behind a single implementation of the `InferenceProvider` trait.
//!
//! # Architecture
//!
//! ```text
//! ExternalProvider (implements InferenceProvider)
//!     └── backends:
//!         ├── OpenAiCompatibleBackend (OpenAI and any compatible gateway)
//!         └── MistralBackend
//! ```
//!
//! The backend is picked once, when the provider is built; callers never branch
//! on which API is behind it.

pub mod backend;
pub mod mistral;
pub mod openai_compatible;

use crate::{ChatCompletionParams, CompletionError, InferenceProvider, StreamingResult};
use async_trait::async_trait;
use backend::{BackendConfig, ExternalBackend};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

pub use mistral::{MistralBackend, DEFAULT_MISTRAL_BASE_URL};
pub use openai_compatible::OpenAiCompatibleBackend;

/// Upstream API selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend")]
pub enum ProviderConfig {
    /// OpenAI-compatible providers
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible {
        /// Base URL for the API (e.g., "https://api.openai.com/v1")
        base_url: String,
        /// Optional organization ID for OpenAI
        #[serde(default)]
        organization_id: Option<String>,
    },

    /// Mistral AI
    #[serde(rename = "mistral")]
    Mistral {
        /// Overrides the public Mistral endpoint
        #[serde(default)]
        base_url: Option<String>,
    },
}

/// Configuration for an external provider
#[derive(Debug, Clone)]
pub struct ExternalProviderConfig {
    /// Model name sent upstream
    pub model_name: String,
    pub provider_config: ProviderConfig,
    /// API key for authentication
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: i64,
}

/// External provider facade
///
/// Implements `InferenceProvider` by delegating to the appropriate backend
/// based on the provider configuration.
pub struct ExternalProvider {
    backend: Arc<dyn ExternalBackend>,
    config: BackendConfig,
    model_name: String,
}

impl ExternalProvider {
    /// Create a new external provider with the given configuration
    pub fn new(external_config: ExternalProviderConfig) -> Result<Self, CompletionError> {
        let ExternalProviderConfig {
            model_name,
            provider_config,
            api_key,
            timeout_seconds,
        } = external_config;

        let client = backend::build_http_client()?;

        let (backend, config): (Arc<dyn ExternalBackend>, BackendConfig) = match provider_config {
            ProviderConfig::OpenAiCompatible {
                base_url,
                organization_id,
            } => {
                let mut extra = HashMap::new();
                if let Some(org_id) = organization_id {
                    extra.insert("organization_id".to_string(), org_id);
                }

                (
                    Arc::new(OpenAiCompatibleBackend::new(client)),
                    BackendConfig {
                        base_url,
                        api_key,
                        timeout_seconds,
                        extra,
                    },
                )
            }
            ProviderConfig::Mistral { base_url } => (
                Arc::new(MistralBackend::new(client)),
                BackendConfig {
                    base_url: base_url.unwrap_or_else(|| DEFAULT_MISTRAL_BASE_URL.to_string()),
                    api_key,
                    timeout_seconds,
                    extra: HashMap::new(),
                },
            ),
        };

        tracing::info!(
            backend = backend.backend_type(),
            base_url = %config.base_url,
            model = %model_name,
            "Configured external provider"
        );

        Ok(Self {
            backend,
            config,
            model_name,
        })
    }

    /// Get the backend type identifier
    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl InferenceProvider for ExternalProvider {
    fn provider_name(&self) -> &str {
        self.backend.display_name()
    }

    async fn chat_completion_stream(
        &self,
        params: ChatCompletionParams,
    ) -> Result<StreamingResult, CompletionError> {
        tracing::debug!(
            backend = self.backend.backend_type(),
            model = %self.model_name,
            messages = params.messages.len(),
            "Opening upstream completion stream"
        );
        self.backend
            .chat_completion_stream(&self.config, &self.model_name, params)
            .await
    }
}
