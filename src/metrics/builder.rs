//! Row-to-metric transform.
//!
//! A result row produces one sample of the query's metric (unless
//! `publish` is off), plus one sample per `value` column routed into a
//! sub-metric, plus whatever its `expand` columns build recursively.
//! Columns of type `id` are copied onto every sample derived from the row.

use super::list::{MetricEntry, MetricList};
use super::types::{sanitize_name, FieldType, Labels, MetricConfig, Sample};
use serde_json::{Map, Value};

/// One record of a query result.
pub type ResultRow = Map<String, Value>;

/// Build the samples contributed by a single result row.
pub fn build_metric_list(name: &str, config: &MetricConfig, row: &ResultRow) -> MetricList {
    let mut main = Sample::new(
        config
            .labels
            .iter()
            .map(|(k, v)| (sanitize_name(k), v.clone()))
            .collect(),
        match &config.value {
            Some(field) => row.get(field).and_then(to_number),
            None => Some(1.0),
        },
    );
    let mut id_labels = Labels::new();
    let mut derived = MetricList::new();

    for (field, value) in row {
        if config.value.as_deref() == Some(field.as_str()) {
            continue;
        }

        for field_config in config.field_configs(field) {
            match field_config.kind {
                FieldType::Ignore => {},
                FieldType::Id => {
                    let target = field_config.target_name(field);
                    let label = field_config.apply_filters(to_label(value));
                    id_labels.insert(target.clone(), label.clone());
                    main.labels.insert(target, label);
                },
                FieldType::Label => {
                    main.labels.insert(
                        field_config.target_name(field),
                        field_config.apply_filters(to_label(value)),
                    );
                },
                FieldType::Value => {
                    let labels = field_config
                        .labels
                        .iter()
                        .map(|(k, v)| (sanitize_name(k), v.clone()))
                        .collect();
                    derived.add(
                        &field_config.sub_metric_name(name, field),
                        [Sample::new(labels, to_number(value))],
                    );
                },
                FieldType::Expand => {
                    let nested_name = field_config.sub_metric_name(name, field);
                    let fallback = MetricConfig::default();
                    let nested_config = field_config.expand.as_deref().unwrap_or(&fallback);
                    for nested_row in nested_rows(value) {
                        derived.extend(build_metric_list(&nested_name, nested_config, nested_row));
                    }
                },
            }
        }
    }

    let mut result = MetricList::new();
    if config.publish {
        result.add(name, [main]);
    }

    let mut derived: Vec<MetricEntry> = derived.into();
    for sample in derived.iter_mut().flat_map(|e| e.samples.iter_mut()) {
        for (label, value) in &id_labels {
            sample.label_if_absent(label, value);
        }
    }
    result.extend(MetricList::from(derived));
    result
}

fn nested_rows(value: &Value) -> Vec<&ResultRow> {
    match value {
        Value::Object(row) => vec![row],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

/// Render a column value as a label value.
pub fn to_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Read a column value as a number, if it has one.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
