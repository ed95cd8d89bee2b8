//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry,
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

    // Window metrics
    pub messages_added: CounterVec,
    pub optimizations: Counter,
    pub optimize_duration: Histogram,
    pub window_tokens: Histogram,

    // Summarization metrics
    pub summaries_created: CounterVec,
    pub summarization_fallbacks: Counter,

    // Branch metrics
    pub branches_created: CounterVec,
    pub branch_merges: CounterVec,
    pub branches_archived: Counter,

    // Persistence metrics
    pub persistence_failures: CounterVec,
    pub persistence_dropped: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let messages_added = register_counter_vec_with_registry!(
            Opts::new("context_messages_added_total", "Total messages appended to windows"),
            &["role"],
            registry
        )?;

        let optimizations = register_counter_with_registry!(
            Opts::new("context_optimizations_total", "Total window optimization passes"),
            registry
        )?;

        let optimize_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "context_optimize_duration_seconds",
                "Window optimization duration in seconds"
            ),
            registry
        )?;

        let window_tokens = register_histogram_with_registry!(
            HistogramOpts::new("context_window_tokens", "Window token count after each append")
                .buckets(vec![250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0, 32000.0]),
            registry
        )?;

        let summaries_created = register_counter_vec_with_registry!(
            Opts::new("context_summaries_created_total", "Total summaries produced"),
            &["strategy"],
            registry
        )?;

        let summarization_fallbacks = register_counter_with_registry!(
            Opts::new(
                "context_summarization_fallbacks_total",
                "Abstractive summaries that fell back to extractive"
            ),
            registry
        )?;

        let branches_created = register_counter_vec_with_registry!(
            Opts::new("context_branches_created_total", "Total branches created"),
            &["reason"],
            registry
        )?;

        let branch_merges = register_counter_vec_with_registry!(
            Opts::new("context_branch_merges_total", "Total branch merges"),
            &["strategy"],
            registry
        )?;

        let branches_archived = register_counter_with_registry!(
            Opts::new("context_branches_archived_total", "Total branches archived, descendants included"),
            registry
        )?;

        let persistence_failures = register_counter_vec_with_registry!(
            Opts::new("context_persistence_failures_total", "Failed persistence operations"),
            &["operation"],
            registry
        )?;

        let persistence_dropped = register_counter_with_registry!(
            Opts::new(
                "context_persistence_dropped_total",
                "Persistence jobs dropped because the queue was full"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            messages_added,
            optimizations,
            optimize_duration,
            window_tokens,
            summaries_created,
            summarization_fallbacks,
            branches_created,
            branch_merges,
            branches_archived,
            persistence_failures,
            persistence_dropped,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record an appended message and the resulting window size
    pub fn record_message(&self, role: &str, window_tokens: usize) {
        self.messages_added.with_label_values(&[role]).inc();
        self.window_tokens.observe(window_tokens as f64);
    }

    /// Record an optimization pass
    pub fn record_optimization(&self, seconds: f64) {
        self.optimizations.inc();
        self.optimize_duration.observe(seconds);
    }

    /// Record a produced summary
    pub fn record_summary(&self, strategy: &str, fell_back: bool) {
        self.summaries_created.with_label_values(&[strategy]).inc();
        if fell_back {
            self.summarization_fallbacks.inc();
        }
    }

    pub fn record_branch_created(&self, reason: &str) {
        self.branches_created.with_label_values(&[reason]).inc();
    }

    pub fn record_merge(&self, strategy: &str) {
        self.branch_merges.with_label_values(&[strategy]).inc();
    }

    pub fn record_archived(&self, count: usize) {
        self.branches_archived.inc_by(count as f64);
    }

    pub fn record_persistence_failure(&self, operation: &str) {
        self.persistence_failures.with_label_values(&[operation]).inc();
    }

    pub fn record_persistence_dropped(&self) {
        self.persistence_dropped.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_and_export() {
        let metrics = Metrics::new().unwrap();
        metrics.record_message("user", 120);
        metrics.record_optimization(0.002);
        metrics.record_summary("extractive", false);
        metrics.record_summary("abstractive", true);
        metrics.record_branch_created("topic_shift");
        metrics.record_merge("full_merge");
        metrics.record_archived(3);
        metrics.record_persistence_failure("save");

        let text = metrics.export_prometheus();
        assert!(text.contains("context_messages_added_total"));
        assert!(text.contains("context_summarization_fallbacks_total 1"));
        assert!(text.contains("context_branches_archived_total 3"));
    }
}
