//! Metrics collection for observability

use prometheus::{
    exponential_buckets, register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Encoder, Histogram, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Budgeting metrics
    pub budget_decisions: CounterVec,
    pub budget_prompt_tokens: Histogram,
    pub budget_output_tokens: Histogram,
    pub budget_duration: Histogram,
    pub budget_anomalies: Counter,
    pub budget_file_truncations: CounterVec,

    // Provider metrics
    pub generation_requests: CounterVec,
    pub generation_duration: HistogramVec,
    pub generation_retries: CounterVec,
    pub generation_circuit_open: CounterVec,

    // Conversation metrics
    pub conversation_appends: CounterVec,
    pub conversation_read_failures: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let budget_decisions = register_counter_vec_with_registry!(
            Opts::new("budget_decisions_total", "Budget decisions by outcome and provider"),
            &["outcome", "provider"],
            registry
        )?;

        let budget_prompt_tokens = register_histogram_with_registry!(
            "budget_prompt_tokens",
            "Tokens in the final prompt",
            exponential_buckets(64.0, 2.0, 16)?,
            registry
        )?;

        let budget_output_tokens = register_histogram_with_registry!(
            "budget_output_tokens",
            "Output tokens requested per decision",
            exponential_buckets(64.0, 2.0, 12)?,
            registry
        )?;

        let budget_duration = register_histogram_with_registry!(
            "budget_duration_seconds",
            "Time spent composing and measuring a prompt",
            registry
        )?;

        let budget_anomalies = register_counter_with_registry!(
            Opts::new("budget_anomalies_total", "Decisions leaving no room for output"),
            registry
        )?;

        let budget_file_truncations = register_counter_vec_with_registry!(
            Opts::new("budget_file_truncations_total", "Attached files cut down or dropped"),
            &["status"],
            registry
        )?;

        let generation_requests = register_counter_vec_with_registry!(
            Opts::new("generation_requests_total", "Provider calls by outcome"),
            &["provider", "status"],
            registry
        )?;

        let generation_duration = register_histogram_vec_with_registry!(
            "generation_duration_seconds",
            "Provider call duration until the response or first chunk",
            &["provider"],
            registry
        )?;

        let generation_retries = register_counter_vec_with_registry!(
            Opts::new("generation_retries_total", "Retried provider calls"),
            &["provider"],
            registry
        )?;

        let generation_circuit_open = register_counter_vec_with_registry!(
            Opts::new("generation_circuit_open_total", "Calls rejected by an open circuit"),
            &["provider"],
            registry
        )?;

        let conversation_appends = register_counter_vec_with_registry!(
            Opts::new("conversation_appends_total", "Conversation turns appended"),
            &["kind"],
            registry
        )?;

        let conversation_read_failures = register_counter_with_registry!(
            Opts::new("conversation_read_failures_total", "History reads that fell back to empty text"),
            registry
        )?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

        Ok(Self {
            registry,
            budget_decisions,
            budget_prompt_tokens,
            budget_output_tokens,
            budget_duration,
            budget_anomalies,
            budget_file_truncations,
            generation_requests,
            generation_duration,
            generation_retries,
            generation_circuit_open,
            conversation_appends,
            conversation_read_failures,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one provider call
    pub fn record_generation(&self, provider: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.generation_requests.with_label_values(&[provider, status]).inc();
        self.generation_duration.with_label_values(&[provider]).observe(seconds);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}
