// API Middleware
//
// Request processing that applies to every route.

pub mod metrics;

pub use metrics::{http_metrics_middleware, MetricsState};
