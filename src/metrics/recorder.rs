//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::error;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a login (provider exchange or native) with its outcome.
    fn record_login(&self, provider: &str, result: &str);

    /// Records the duration of a login request.
    fn record_login_duration(&self, provider: &str, duration_secs: f64);

    /// Records a message submission with its outcome.
    fn record_message_submission(&self, result: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    logins_total: CounterVec,
    login_duration_seconds: HistogramVec,
    messages_submitted_total: CounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let logins_total = register_counter_vec_with_registry!(
            Opts::new(
                "wishtree_login_exchanges_total",
                "Total number of login attempts"
            ),
            &["provider", "result"],
            registry.clone()
        )
        .expect("Failed to register wishtree_login_exchanges_total");

        let login_duration_seconds = register_histogram_vec_with_registry!(
            "wishtree_login_exchange_duration_seconds",
            "Login duration in seconds, including upstream calls",
            &["provider"],
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register wishtree_login_exchange_duration_seconds");

        let messages_submitted_total = register_counter_vec_with_registry!(
            Opts::new(
                "wishtree_messages_submitted_total",
                "Total number of message submissions"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register wishtree_messages_submitted_total");

        Metrics {
            registry,
            logins_total,
            login_duration_seconds,
            messages_submitted_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl MetricsRecorder for Metrics {
    fn record_login(&self, provider: &str, result: &str) {
        self.logins_total
            .with_label_values(&[provider, result])
            .inc();
    }

    fn record_login_duration(&self, provider: &str, duration_secs: f64) {
        self.login_duration_seconds
            .with_label_values(&[provider])
            .observe(duration_secs);
    }

    fn record_message_submission(&self, result: &str) {
        self.messages_submitted_total
            .with_label_values(&[result])
            .inc();
    }
}
