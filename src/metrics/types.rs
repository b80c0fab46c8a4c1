//! Sample and extraction-rule types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label set of a single sample, ordered by label name.
pub type Labels = BTreeMap<String, String>;

/// One labeled, optionally-valued data point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Label name to label value.
    #[serde(default)]
    pub labels: Labels,
    /// Numeric value; `None` keeps the label set but renders nothing.
    #[serde(default)]
    pub value: Option<f64>,
}

impl Sample {
    /// Create a sample from labels and a value.
    pub fn new(labels: Labels, value: Option<f64>) -> Self {
        Self { labels, value }
    }

    /// Set a label unless it already exists.
    pub fn label_if_absent(&mut self, name: &str, value: &str) {
        if !self.labels.contains_key(name) {
            self.labels.insert(name.to_string(), value.to_string());
        }
    }
}

/// How rows of one query become samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricConfig {
    /// Field holding the value of the main metric. Without it every row counts as 1.
    pub value: Option<String>,
    /// Static labels added to the main metric.
    pub labels: BTreeMap<String, String>,
    /// Per-field rules.
    pub fields: Vec<FieldConfig>,
    /// Rule for fields without an entry in `fields`.
    pub default_field: FieldConfig,
    /// Emit the main metric at all.
    pub publish: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            value: None,
            labels: BTreeMap::new(),
            fields: Vec::new(),
            default_field: FieldConfig::default(),
            publish: true,
        }
    }
}

impl MetricConfig {
    /// Field rules matching a result column; falls back to the default rule.
    pub fn field_configs<'a>(&'a self, field: &str) -> Vec<&'a FieldConfig> {
        let matches: Vec<&FieldConfig> = self.fields.iter().filter(|f| f.name == field).collect();
        if matches.is_empty() {
            vec![&self.default_field]
        } else {
            matches
        }
    }
}

/// Rule for a single result column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldConfig {
    /// Column name in the result row.
    pub name: String,
    /// Label name (or sub-metric suffix); defaults to the column name.
    pub target: Option<String>,
    /// What the column contributes.
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Explicit name for a sub-metric produced by `value` or `expand`.
    pub metric: Option<String>,
    /// Static labels for a sub-metric.
    pub labels: BTreeMap<String, String>,
    /// Transformations applied to label values.
    pub filters: Vec<FieldFilter>,
    /// Rules for nested rows of an `expand` column.
    pub expand: Option<Box<MetricConfig>>,
}

impl FieldConfig {
    /// Sanitized label name for a column.
    pub fn target_name(&self, field: &str) -> String {
        sanitize_name(self.target.as_deref().unwrap_or(field))
    }

    /// Name of the sub-metric derived from this column.
    pub fn sub_metric_name(&self, parent: &str, field: &str) -> String {
        match &self.metric {
            Some(name) => sanitize_name(name),
            None => format!("{}_{}", parent, self.target_name(field)),
        }
    }

    /// Apply the configured filters in order.
    pub fn apply_filters(&self, value: String) -> String {
        self.filters.iter().fold(value, |acc, filter| filter.apply(&acc))
    }
}

/// Contribution of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Label on the main metric, propagated to every derived sample of the row.
    Id,
    /// Label on the main metric only.
    #[default]
    Label,
    /// Numeric value, either of the main metric or of a sub-metric.
    Value,
    /// Dropped.
    Ignore,
    /// Nested object or array of objects, built recursively.
    Expand,
}

/// Label value transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldFilter {
    ToLower,
    ToUpper,
    ToTitle,
    Trim,
}

impl FieldFilter {
    fn apply(self, value: &str) -> String {
        match self {
            FieldFilter::ToLower => value.to_lowercase(),
            FieldFilter::ToUpper => value.to_uppercase(),
            FieldFilter::Trim => value.trim().to_string(),
            FieldFilter::ToTitle => value
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Coerce a name into `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Whether a name is a valid Prometheus metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("resourceGroup"), "resourceGroup");
        assert_eq!(sanitize_name("properties.sku-name"), "properties_sku_name");
        assert_eq!(sanitize_name("1st"), "_1st");
        assert_eq!(sanitize_name(""), "_");
    }

    #[test]
    fn test_metric_name_validation() {
        assert!(is_valid_metric_name("azure_resources"));
        assert!(is_valid_metric_name("ns:azure_resources"));
        assert!(!is_valid_metric_name("9lives"));
        assert!(!is_valid_metric_name("azure-resources"));
        assert!(!is_valid_metric_name(""));
    }

    #[test]
    fn test_filters() {
        let field = FieldConfig {
            filters: vec![FieldFilter::Trim, FieldFilter::ToLower],
            ..FieldConfig::default()
        };
        assert_eq!(field.apply_filters("  WestEurope ".to_string()), "westeurope");
        assert_eq!(FieldFilter::ToTitle.apply("west europe"), "West Europe");
    }

    #[test]
    fn test_field_config_lookup_falls_back_to_default() {
        let config = MetricConfig {
            fields: vec![FieldConfig {
                name: "count_".to_string(),
                kind: FieldType::Value,
                ..FieldConfig::default()
            }],
            default_field: FieldConfig {
                kind: FieldType::Id,
                ..FieldConfig::default()
            },
            ..MetricConfig::default()
        };

        assert_eq!(config.field_configs("count_")[0].kind, FieldType::Value);
        assert_eq!(config.field_configs("location")[0].kind, FieldType::Id);
    }

    #[test]
    fn test_yaml_field_rules() {
        let yaml = r#"
value: count_
labels:
  source: graph
defaultField:
  type: id
fields:
  - name: type
    target: resource_type
    filters: [toLower]
  - name: tags
    type: expand
    expand:
      publish: true
"#;
        let config: MetricConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.value.as_deref(), Some("count_"));
        assert_eq!(config.default_field.kind, FieldType::Id);
        assert_eq!(config.fields[0].target_name("type"), "resource_type");
        assert_eq!(config.fields[0].filters, vec![FieldFilter::ToLower]);
        assert_eq!(config.fields[1].kind, FieldType::Expand);
        assert!(config.fields[1].expand.is_some());
        assert!(config.publish);
    }
}
