//! HTTP metrics middleware for tracking request counts and latencies.
//!
//! This middleware records low-cardinality metrics for all HTTP requests:
//! - `tutor_relay.http.requests` - Count of HTTP requests by method, endpoint, status
//! - `tutor_relay.http.duration` - Histogram of time to response headers by method, endpoint
//!
//! Streamed bodies are measured by the relay itself; this layer only sees the
//! moment the response head is ready.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use services::metrics::{
    consts::{METRIC_HTTP_DURATION, METRIC_HTTP_REQUESTS, TAG_ENDPOINT, TAG_METHOD, TAG_STATUS_CODE},
    tag, MetricsServiceTrait,
};
use std::sync::Arc;
use std::time::Instant;

/// State for the metrics middleware
#[derive(Clone)]
pub struct MetricsState {
    pub metrics_service: Arc<dyn MetricsServiceTrait>,
}

/// Middleware that records HTTP request metrics
pub async fn http_metrics_middleware(
    State(state): State<MetricsState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = endpoint_label(req.extensions().get::<MatchedPath>());

    let response = next.run(req).await;
    let duration = start.elapsed();
    let status = response.status().as_u16();

    let tags = [
        tag(TAG_METHOD, &method),
        tag(TAG_ENDPOINT, &endpoint),
        tag(TAG_STATUS_CODE, status),
    ];
    let tags_str: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();

    state
        .metrics_service
        .record_latency(METRIC_HTTP_DURATION, duration, &tags_str);
    state
        .metrics_service
        .record_count(METRIC_HTTP_REQUESTS, 1, &tags_str);

    response
}

/// Route template when one matched, a fixed label otherwise
fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}
