//! Per-request collection of samples grouped by metric name.
//!
//! Names keep their first-insertion order. The list serializes to a JSON
//! array of `{name, samples}` entries, which is what the probe cache stores.

use super::types::Sample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// All samples of one metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub samples: Vec<Sample>,
}

/// Ordered mapping from metric name to samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MetricEntry>", into = "Vec<MetricEntry>")]
pub struct MetricList {
    entries: Vec<MetricEntry>,
    index: HashMap<String, usize>,
}

impl MetricList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples under `name`, creating the metric on first use.
    pub fn add<I>(&mut self, name: &str, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                self.entries.push(MetricEntry {
                    name: name.to_string(),
                    samples: Vec::new(),
                });
                let slot = self.entries.len() - 1;
                self.index.insert(name.to_string(), slot);
                slot
            },
        };
        self.entries[slot].samples.extend(samples);
    }

    /// Move every sample of `other` into this list.
    pub fn extend(&mut self, other: MetricList) {
        for entry in other.entries {
            self.add(&entry.name, entry.samples);
        }
    }

    /// Metric names in insertion order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Samples of one metric.
    pub fn samples(&self, name: &str) -> &[Sample] {
        self.index
            .get(name)
            .map_or(&[][..], |&slot| self.entries[slot].samples.as_slice())
    }

    /// Sorted union of label names over every sample of a metric.
    pub fn label_names(&self, name: &str) -> Vec<String> {
        self.samples(name)
            .iter()
            .flat_map(|s| s.labels.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Give every sample of a metric the full label schema, using `""` for gaps.
    pub fn fill_missing_labels(&mut self) {
        for entry in &mut self.entries {
            let names: BTreeSet<String> = entry
                .samples
                .iter()
                .flat_map(|s| s.labels.keys().cloned())
                .collect();
            for sample in &mut entry.samples {
                for name in &names {
                    sample.label_if_absent(name, "");
                }
            }
        }
    }

    /// Number of distinct metric names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of samples across all metrics.
    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|e| e.samples.len()).sum()
    }
}

impl PartialEq for MetricList {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl From<Vec<MetricEntry>> for MetricList {
    fn from(entries: Vec<MetricEntry>) -> Self {
        let mut list = MetricList::new();
        for entry in entries {
            list.add(&entry.name, entry.samples);
        }
        list
    }
}

impl From<MetricList> for Vec<MetricEntry> {
    fn from(list: MetricList) -> Self {
        list.entries
    }
}
