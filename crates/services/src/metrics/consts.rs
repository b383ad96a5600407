// Latency metrics
pub const METRIC_LATENCY_TTFF: &str = "tutor_relay.latency.time_to_first_fragment";
pub const METRIC_LATENCY_TOTAL: &str = "tutor_relay.latency.total";

// HTTP metrics
pub const METRIC_HTTP_REQUESTS: &str = "tutor_relay.http.requests";
pub const METRIC_HTTP_DURATION: &str = "tutor_relay.http.duration";

// Usage metrics
pub const METRIC_REQUEST_COUNT: &str = "tutor_relay.request.count";
pub const METRIC_STREAM_FRAGMENTS: &str = "tutor_relay.stream.fragments";

// Outcome metrics
pub const METRIC_VALIDATION_REJECTIONS: &str = "tutor_relay.request.rejected";
pub const METRIC_PRE_STREAM_ERRORS: &str = "tutor_relay.request.errors";
pub const METRIC_STREAM_OUTCOMES: &str = "tutor_relay.stream.outcome";

// Low-cardinality tags only (never message content)
pub const TAG_PROVIDER: &str = "provider";
pub const TAG_OUTCOME: &str = "outcome";
pub const TAG_REASON: &str = "reason";
pub const TAG_LANGUAGE: &str = "language";
pub const TAG_MODALITY: &str = "modality";
pub const TAG_LEVEL: &str = "level";
pub const TAG_ENVIRONMENT: &str = "environment";
pub const TAG_METHOD: &str = "method";
pub const TAG_ENDPOINT: &str = "endpoint";
pub const TAG_STATUS_CODE: &str = "status_code";

// Stream outcomes for TAG_OUTCOME
pub const OUTCOME_COMPLETED: &str = "completed";
pub const OUTCOME_EMPTY: &str = "empty";
pub const OUTCOME_UPSTREAM_ERROR: &str = "upstream_error";
pub const OUTCOME_CLIENT_DISCONNECT: &str = "client_disconnect";
pub const OUTCOME_CANCELLED: &str = "cancelled";

/// Get the current environment from the ENVIRONMENT env var, defaulting to "local"
pub fn get_environment() -> String {
    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string())
}
