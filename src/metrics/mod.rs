//! Prometheus counters and histograms for token renewal, request retries
//! and logouts.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
