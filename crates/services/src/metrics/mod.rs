pub mod capturing;
pub mod consts;

use async_trait::async_trait;
use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[async_trait]
pub trait MetricsServiceTrait: Send + Sync {
    fn record_latency(&self, name: &str, duration: Duration, tags: &[&str]);
    fn record_count(&self, name: &str, value: i64, tags: &[&str]);
    fn record_histogram(&self, name: &str, value: f64, tags: &[&str]);
}

pub struct OtlpMetricsService {
    meter: Meter,
    environment: String,
    // Cache instruments to avoid recreating them
    latency_histograms: Mutex<HashMap<String, Histogram<u64>>>,
    counters: Mutex<HashMap<String, Counter<u64>>>,
    value_histograms: Mutex<HashMap<String, Histogram<f64>>>,
}

impl OtlpMetricsService {
    /// Build on a meter obtained from the installed meter provider
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            environment: consts::get_environment(),
            latency_histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            value_histograms: Mutex::new(HashMap::new()),
        }
    }

    fn parse_tags(&self, tags: &[&str]) -> Vec<KeyValue> {
        tags.iter()
            .filter_map(|tag| {
                tag.split_once(':')
                    .map(|(key, value)| KeyValue::new(key.to_string(), value.to_string()))
            })
            .chain(std::iter::once(KeyValue::new(
                consts::TAG_ENVIRONMENT,
                self.environment.clone(),
            )))
            .collect()
    }
}

#[async_trait]
impl MetricsServiceTrait for OtlpMetricsService {
    fn record_latency(&self, name: &str, duration: Duration, tags: &[&str]) {
        let Ok(mut histograms) = self.latency_histograms.lock() else {
            return;
        };
        let histogram = histograms.entry(name.to_string()).or_insert_with(|| {
            let description = match name {
                consts::METRIC_LATENCY_TTFF => {
                    "Time from request acceptance to the first relayed fragment"
                }
                consts::METRIC_LATENCY_TOTAL => "Total relayed stream duration",
                consts::METRIC_HTTP_DURATION => "HTTP request duration until response headers",
                _ => "Latency measurement",
            };

            self.meter
                .u64_histogram(name.to_string())
                .with_description(description)
                .with_unit("ms")
                .build()
        });

        let kv_tags = self.parse_tags(tags);
        histogram.record(duration.as_millis() as u64, &kv_tags);
    }

    fn record_count(&self, name: &str, value: i64, tags: &[&str]) {
        let Ok(mut counters) = self.counters.lock() else {
            return;
        };
        let counter = counters.entry(name.to_string()).or_insert_with(|| {
            let description = match name {
                consts::METRIC_REQUEST_COUNT => "Total number of help requests",
                consts::METRIC_HTTP_REQUESTS => "Total number of HTTP requests",
                consts::METRIC_VALIDATION_REJECTIONS => "Help requests rejected by validation",
                consts::METRIC_PRE_STREAM_ERRORS => "Help requests failed before streaming",
                consts::METRIC_STREAM_OUTCOMES => "Relayed streams by outcome",
                _ => "Count",
            };

            self.meter
                .u64_counter(name.to_string())
                .with_description(description)
                .build()
        });

        let kv_tags = self.parse_tags(tags);
        counter.add(value.max(0) as u64, &kv_tags);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &[&str]) {
        let Ok(mut histograms) = self.value_histograms.lock() else {
            return;
        };
        let histogram = histograms.entry(name.to_string()).or_insert_with(|| {
            let description = match name {
                consts::METRIC_STREAM_FRAGMENTS => "Fragments relayed per stream",
                _ => "Value distribution",
            };

            self.meter
                .f64_histogram(name.to_string())
                .with_description(description)
                .build()
        });

        let kv_tags = self.parse_tags(tags);
        histogram.record(value, &kv_tags);
    }
}

// Helper functions for creating properly formatted tags
/// Create a tag in the "key:value" format
pub fn tag(key: &str, value: impl std::fmt::Display) -> String {
    format!("{key}:{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    #[test]
    fn test_tag_helper() {
        assert_eq!(tag("provider", "Mistral"), "provider:Mistral");
        assert_eq!(tag(consts::TAG_LEVEL, 3), "level:3");
    }

    #[test]
    fn test_parse_tags_skips_malformed_and_adds_environment() {
        let provider = SdkMeterProvider::builder().build();
        let service = OtlpMetricsService::new(provider.meter("test"));

        let parsed = service.parse_tags(&["provider:LLM", "malformed", "reason:a:b"]);

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].key.as_str(), "provider");
        assert_eq!(parsed[1].value.as_str(), "a:b");
        assert_eq!(parsed[2].key.as_str(), consts::TAG_ENVIRONMENT);
    }

    #[test]
    fn test_recording_without_exporter_does_not_panic() {
        let provider = SdkMeterProvider::builder().build();
        let service = OtlpMetricsService::new(provider.meter("test"));

        service.record_count(consts::METRIC_REQUEST_COUNT, 1, &["language:EN"]);
        service.record_latency(consts::METRIC_LATENCY_TTFF, Duration::from_millis(12), &[]);
        service.record_histogram(consts::METRIC_STREAM_FRAGMENTS, 4.0, &[]);
    }
}
