//! Prometheus text rendering of a [`MetricList`].

use super::list::MetricList;
use crate::core::{ProbeError, Result};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render every metric of the list as a gauge family.
///
/// Each family is declared with the union of label names seen across its
/// samples; labels a sample lacks are rendered as `""`. Samples without a
/// value create no series. The registry lives only for this call.
pub fn render(list: &MetricList) -> Result<String> {
    let registry = Registry::new();

    for name in list.metric_names() {
        let label_names = list.label_names(name);
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();

        let gauge = match GaugeVec::new(Opts::new(name, name), &label_refs) {
            Ok(gauge) => gauge,
            Err(e) => {
                tracing::warn!(metric = name, error = %e, "skipping metric with invalid schema");
                continue;
            },
        };
        if let Err(e) = registry.register(Box::new(gauge.clone())) {
            tracing::warn!(metric = name, error = %e, "unable to register metric");
            continue;
        }

        for sample in list.samples(name) {
            let Some(value) = sample.value else {
                continue;
            };
            let label_values: Vec<&str> = label_names
                .iter()
                .map(|label| sample.labels.get(label).map_or("", String::as_str))
                .collect();
            gauge.get_metric_with_label_values(&label_values)?.set(value);
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ProbeError::decode(e.to_string()))
}
