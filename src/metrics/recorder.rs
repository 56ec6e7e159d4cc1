//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_int_counter_with_registry, CounterVec, Encoder, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording client-side authentication metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records the outcome of a renewal network round trip.
    fn record_renewal(&self, result: &str);

    /// Records how long a renewal took, from start to flag reset.
    fn record_renewal_duration(&self, duration_secs: f64, result: &str);

    /// Records a caller that attached to a renewal already in flight.
    fn record_renewal_join(&self);

    /// Records what happened to a request that hit the expired-token signal.
    fn record_retry(&self, outcome: &str);

    /// Records a logout and whether the server acknowledged it.
    fn record_logout(&self, server_result: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Renewal metrics
    renewals_total: CounterVec,
    renewal_duration_seconds: HistogramVec,
    renewal_joins_total: IntCounter,

    // Request metrics
    request_retries_total: CounterVec,

    // Session metrics
    logouts_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let renewals_total = register_counter_vec_with_registry!(
            Opts::new("token_renewals_total", "Token renewal attempts by result"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register token_renewals_total");

        let renewal_duration_seconds = register_histogram_vec_with_registry!(
            "token_renewal_duration_seconds",
            "Token renewal duration in seconds",
            &["result"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register token_renewal_duration_seconds");

        let renewal_joins_total = register_int_counter_with_registry!(
            Opts::new(
                "token_renewal_joins_total",
                "Callers that waited on a renewal started by someone else"
            ),
            registry.clone()
        )
        .expect("Failed to register token_renewal_joins_total");

        let request_retries_total = register_counter_vec_with_registry!(
            Opts::new(
                "request_retries_total",
                "Requests that hit the expired-token signal, by outcome"
            ),
            &["outcome"],
            registry.clone()
        )
        .expect("Failed to register request_retries_total");

        let logouts_total = register_counter_vec_with_registry!(
            Opts::new("logouts_total", "Local logouts by server acknowledgement"),
            &["server_result"],
            registry.clone()
        )
        .expect("Failed to register logouts_total");

        Metrics {
            registry,
            renewals_total,
            renewal_duration_seconds,
            renewal_joins_total,
            request_retries_total,
            logouts_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    pub fn renewals(&self, result: &str) -> f64 {
        self.renewals_total.with_label_values(&[result]).get()
    }

    pub fn renewal_joins(&self) -> u64 {
        self.renewal_joins_total.get()
    }

    pub fn retries(&self, outcome: &str) -> f64 {
        self.request_retries_total.with_label_values(&[outcome]).get()
    }

    pub fn logouts(&self, server_result: &str) -> f64 {
        self.logouts_total.with_label_values(&[server_result]).get()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_renewal(&self, result: &str) {
        self.renewals_total.with_label_values(&[result]).inc();
    }

    fn record_renewal_duration(&self, duration_secs: f64, result: &str) {
        self.renewal_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    fn record_renewal_join(&self) {
        self.renewal_joins_total.inc();
    }

    fn record_retry(&self, outcome: &str) {
        self.request_retries_total.with_label_values(&[outcome]).inc();
    }

    fn record_logout(&self, server_result: &str) {
        self.logouts_total.with_label_values(&[server_result]).inc();
    }
}
