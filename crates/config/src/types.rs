use inference_providers::CompletionParams;
use serde::Deserialize;
use std::{collections::HashMap, env, fmt, str::FromStr};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            sampling: SamplingConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            telemetry: TelemetryConfig::from_env(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| default_host()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| default_port().to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream completion API family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmApi {
    /// Mistral La Plateforme chat API
    Mistral,
    /// Any OpenAI-compatible chat completions API
    #[serde(rename = "openai", alias = "openai_compatible")]
    OpenAi,
}

impl FromStr for LlmApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mistral" => Ok(LlmApi::Mistral),
            "openai" | "openai_compatible" | "" => Ok(LlmApi::OpenAi),
            other => Err(format!(
                "LLM_API must be one of 'mistral' or 'openai', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for LlmApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmApi::Mistral => write!(f, "mistral"),
            LlmApi::OpenAi => write!(f, "openai"),
        }
    }
}

/// Upstream provider selection and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_api")]
    pub api: LlmApi,
    pub api_key: String,
    /// Base URL of the chat API; required for OpenAI-compatible providers
    #[serde(default)]
    pub url: Option<String>,
    pub model: String,
    /// Optional OpenAI organization header
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
}

fn default_llm_api() -> LlmApi {
    LlmApi::OpenAi
}

fn default_timeout_seconds() -> i64 {
    120
}

impl LlmConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            api: env::var("LLM_API")
                .map(|v| v.parse())
                .unwrap_or(Ok(default_llm_api()))?,
            api_key: env::var("LLM_API_KEY").map_err(|_| "LLM_API_KEY not set")?,
            url: env::var("LLM_URL").ok().filter(|s| !s.trim().is_empty()),
            model: env::var("LLM_MODEL").map_err(|_| "LLM_MODEL not set")?,
            organization_id: env::var("LLM_ORGANIZATION_ID").ok(),
            timeout_seconds: env::var("LLM_TIMEOUT_SECONDS")
                .ok()
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| "LLM_TIMEOUT_SECONDS must be a valid number")
                })
                .transpose()?
                .unwrap_or_else(default_timeout_seconds),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the provider layer cannot serve
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err("LLM api_key must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("LLM model must not be empty".to_string());
        }
        if self.api == LlmApi::OpenAi && self.url.is_none() {
            return Err("LLM_URL is required for OpenAI-compatible providers".to_string());
        }
        if self.timeout_seconds <= 0 {
            return Err("LLM timeout must be positive".to_string());
        }
        Ok(())
    }
}

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling temperature between 0 and 2
    pub temperature: f32,
    /// Upper bound on generated tokens per answer
    pub max_tokens: i64,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let defaults = CompletionParams::default();
        Self {
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            top_p: defaults.top_p,
            presence_penalty: defaults.presence_penalty,
            frequency_penalty: defaults.frequency_penalty,
        }
    }
}

fn env_override<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}

impl SamplingConfig {
    /// Load overrides from environment variables, keeping defaults for unset ones
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            temperature: env_override("LLM_TEMPERATURE", defaults.temperature)?,
            max_tokens: env_override("LLM_MAX_TOKENS", defaults.max_tokens)?,
            top_p: env_override("LLM_TOP_P", defaults.top_p)?,
            presence_penalty: env_override("LLM_PRESENCE_PENALTY", defaults.presence_penalty)?,
            frequency_penalty: env_override("LLM_FREQUENCY_PENALTY", defaults.frequency_penalty)?,
        })
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_PROVIDERS") {
            modules.insert("inference_providers".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| default_log_format()),
            modules,
        })
    }

    /// Render the `EnvFilter` directive string, e.g. `info,api=debug`
    pub fn filter_directive(&self) -> String {
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();

        let mut filter = self.level.clone();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            modules: HashMap::new(),
        }
    }
}

/// OpenTelemetry metrics export
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; metrics stay in-process when unset
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "tutor-relay".to_string()
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| default_service_name()),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_llm_env() {
        for name in [
            "LLM_API",
            "LLM_API_KEY",
            "LLM_URL",
            "LLM_MODEL",
            "LLM_ORGANIZATION_ID",
            "LLM_TIMEOUT_SECONDS",
            "LLM_TEMPERATURE",
            "LLM_MAX_TOKENS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_llm_api_parsing() {
        assert_eq!("mistral".parse::<LlmApi>().unwrap(), LlmApi::Mistral);
        assert_eq!("Mistral".parse::<LlmApi>().unwrap(), LlmApi::Mistral);
        assert_eq!("openai".parse::<LlmApi>().unwrap(), LlmApi::OpenAi);
        assert!("anthropic".parse::<LlmApi>().is_err());
    }

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.temperature, 0.3);
        assert_eq!(sampling.max_tokens, 500);
        assert_eq!(sampling.top_p, 0.9);
        assert_eq!(sampling.presence_penalty, 0.0);
        assert_eq!(sampling.frequency_penalty, 0.0);
    }

    #[test]
    fn test_openai_requires_url() {
        let config = LlmConfig {
            api: LlmApi::OpenAi,
            api_key: "sk-test".to_string(),
            url: None,
            model: "gpt-4o-mini".to_string(),
            organization_id: None,
            timeout_seconds: 120,
        };
        assert!(config.validate().is_err());

        let mistral = LlmConfig {
            api: LlmApi::Mistral,
            model: "mistral-small-latest".to_string(),
            ..config
        };
        assert!(mistral.validate().is_ok());
    }

    #[test]
    fn test_filter_directive_is_sorted() {
        let mut modules = HashMap::new();
        modules.insert("services".to_string(), "debug".to_string());
        modules.insert("api".to_string(), "trace".to_string());
        let logging = LoggingConfig {
            level: "info".to_string(),
            format: "json".to_string(),
            modules,
        };
        assert_eq!(logging.filter_directive(), "info,api=trace,services=debug");
    }

    #[test]
    #[serial]
    fn test_llm_config_from_env() {
        clear_llm_env();
        env::set_var("LLM_API", "mistral");
        env::set_var("LLM_API_KEY", "key-123");
        env::set_var("LLM_MODEL", "mistral-small-latest");
        env::set_var("LLM_TIMEOUT_SECONDS", "45");

        let config = LlmConfig::from_env().unwrap();
        assert_eq!(config.api, LlmApi::Mistral);
        assert_eq!(config.api_key, "key-123");
        assert_eq!(config.url, None);
        assert_eq!(config.timeout_seconds, 45);
        clear_llm_env();
    }

    #[test]
    #[serial]
    fn test_llm_config_from_env_missing_key() {
        clear_llm_env();
        env::set_var("LLM_MODEL", "gpt-4o-mini");
        env::set_var("LLM_URL", "http://localhost:8000/v1");

        let err = LlmConfig::from_env().unwrap_err();
        assert!(err.contains("LLM_API_KEY"));
        clear_llm_env();
    }

    #[test]
    #[serial]
    fn test_sampling_overrides_from_env() {
        clear_llm_env();
        env::set_var("LLM_TEMPERATURE", "0.7");
        env::set_var("LLM_MAX_TOKENS", "256");

        let sampling = SamplingConfig::from_env().unwrap();
        assert_eq!(sampling.temperature, 0.7);
        assert_eq!(sampling.max_tokens, 256);
        assert_eq!(sampling.top_p, 0.9);

        env::set_var("LLM_MAX_TOKENS", "lots");
        assert!(SamplingConfig::from_env().is_err());
        clear_llm_env();
    }
}
