use crate::metrics::MetricsServiceTrait;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub name: String,
    pub value: MetricValue,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Latency(Duration),
    Count(i64),
    Histogram(f64),
}

/// Metrics service that keeps every recorded value in memory, for assertions in tests
#[derive(Default)]
pub struct CapturingMetricsService {
    metrics: Mutex<Vec<RecordedMetric>>,
}

impl CapturingMetricsService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedMetric>> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, name: &str, value: MetricValue, tags: &[&str]) {
        self.lock().push(RecordedMetric {
            name: name.to_string(),
            value,
            tags: tags.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub fn get_metrics(&self) -> Vec<RecordedMetric> {
        self.lock().clone()
    }

    /// Sum of all counts recorded under `name` carrying `tag` (any tag when `None`)
    pub fn count(&self, name: &str, tag: Option<&str>) -> i64 {
        self.lock()
            .iter()
            .filter(|m| m.name == name)
            .filter(|m| tag.map_or(true, |t| m.tags.iter().any(|own| own == t)))
            .filter_map(|m| match m.value {
                MetricValue::Count(value) => Some(value),
                _ => None,
            })
            .sum()
    }
}

#[async_trait]
impl MetricsServiceTrait for CapturingMetricsService {
    fn record_latency(&self, name: &str, duration: Duration, tags: &[&str]) {
        self.push(name, MetricValue::Latency(duration), tags);
    }

    fn record_count(&self, name: &str, value: i64, tags: &[&str]) {
        self.push(name, MetricValue::Count(value), tags);
    }

    fn record_histogram(&self, name: &str, value: f64, tags: &[&str]) {
        self.push(name, MetricValue::Histogram(value), tags);
    }
}
