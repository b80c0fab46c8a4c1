//! Self-telemetry of the probe.
//!
//! These collectors describe the probe's own query activity and are served
//! on `/metrics`. They live in a registry owned by the application state,
//! separate from the short-lived registries used to render probe results.

use crate::core::Result;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const QUERY_LABELS: &[&str] = &["module", "metric"];

/// Collectors for query activity, keyed by module and metric.
#[derive(Clone)]
pub struct ProbeMetrics {
    registry: Registry,
    /// Page requests sent to Resource Graph.
    pub query_requests: IntCounterVec,
    /// Wall time of a whole paginated query.
    pub query_time: HistogramVec,
    /// Result count of the last run of a query.
    pub query_results: GaugeVec,
}

impl ProbeMetrics {
    /// Create the collectors and register them in a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let query_requests = IntCounterVec::new(
            Opts::new(
                "azure_resourcegraph_query_requests",
                "Azure ResourceGraph query requests",
            ),
            QUERY_LABELS,
        )?;
        let query_time = HistogramVec::new(
            HistogramOpts::new("azure_resourcegraph_query_time", "Azure ResourceGraph query time")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            QUERY_LABELS,
        )?;
        let query_results = GaugeVec::new(
            Opts::new(
                "azure_resourcegraph_query_results",
                "Azure ResourceGraph query results",
            ),
            QUERY_LABELS,
        )?;

        registry.register(Box::new(query_requests.clone()))?;
        registry.register(Box::new(query_time.clone()))?;
        registry.register(Box::new(query_results.clone()))?;

        Ok(Self {
            registry,
            query_requests,
            query_time,
            query_results,
        })
    }

    /// Count one page request.
    pub fn count_request(&self, module: &str, metric: &str) {
        self.query_requests.with_label_values(&[module, metric]).inc();
    }

    /// Record the outcome of a finished query.
    pub fn observe_query(&self, module: &str, metric: &str, elapsed: Duration, results: u64) {
        self.query_time
            .with_label_values(&[module, metric])
            .observe(elapsed.as_secs_f64());
        self.query_results
            .with_label_values(&[module, metric])
            .set(results as f64);
    }

    /// Render the collectors in text format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
