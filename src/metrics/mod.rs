//! Query result shaping and exposition.
//!
//! Result rows flow through [`build_metric_list`] into a per-request
//! [`MetricList`], which [`render`] turns into Prometheus text.

pub mod builder;
pub mod exposition;
pub mod list;
pub mod types;

pub use builder::{build_metric_list, ResultRow};
pub use exposition::{render, CONTENT_TYPE};
pub use list::{MetricEntry, MetricList};
pub use types::{FieldConfig, FieldFilter, FieldType, Labels, MetricConfig, Sample};
