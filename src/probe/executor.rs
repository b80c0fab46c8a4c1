//! Paginated execution of a single configured query.

use crate::core::{ProbeError, QueryConfig};
use crate::graph::{QueryRequest, ResourceGraph};
use crate::metrics::{build_metric_list, MetricList};
use crate::monitoring::ProbeMetrics;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Rows requested per page.
pub const PAGE_SIZE: usize = 1000;

/// Runs one query to completion and appends its samples to a shared list.
pub struct QueryExecutor {
    pub graph: Arc<dyn ResourceGraph>,
    pub query: Arc<QueryConfig>,
    pub module: String,
    pub subscriptions: Vec<String>,
    pub metrics: ProbeMetrics,
    pub sink: Arc<Mutex<MetricList>>,
}

/// What a finished query did.
#[derive(Debug, Default)]
pub struct QueryReport {
    /// Page requests sent
    pub pages: usize,
    /// Rows turned into samples
    pub rows: usize,
    /// Total reported by the service, if any
    pub total_records: Option<u64>,
    /// Error that ended pagination early
    pub error: Option<ProbeError>,
}

impl QueryReport {
    /// Result count published for the query.
    pub fn result_count(&self) -> u64 {
        self.total_records.unwrap_or(self.rows as u64)
    }
}

impl QueryExecutor {
    /// Page through the query.
    ///
    /// Stops on an empty or short page, once `skip` reaches the reported
    /// total, or on the first error. Pages already appended are kept.
    pub async fn run(self) -> QueryReport {
        let started = Instant::now();
        let metric = self.query.metric.as_str();
        tracing::debug!(module = %self.module, metric, "starting query");

        let mut report = QueryReport::default();
        let mut request = QueryRequest {
            query: self.query.query.clone(),
            subscriptions: self.subscriptions.clone(),
            skip: 0,
            top: PAGE_SIZE,
        };

        loop {
            self.metrics.count_request(&self.module, metric);
            report.pages += 1;

            let page = match self.graph.query(&request).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        module = %self.module,
                        metric,
                        error = %e,
                        category = e.category(),
                        "query failed"
                    );
                    report.error = Some(e);
                    break;
                },
            };
            if report.total_records.is_none() {
                report.total_records = page.total_records;
            }

            let rows = match page.rows() {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::error!(module = %self.module, metric, error = %e, "unable to decode page");
                    report.error = Some(e);
                    break;
                },
            };
            // paging follows what the service returned, not what decoded
            let fetched = page.item_count();
            if fetched == 0 {
                break;
            }

            let mut built = MetricList::new();
            for row in &rows {
                built.extend(build_metric_list(metric, &self.query.metric_config, row));
            }
            self.sink.lock().extend(built);
            report.rows += rows.len();

            request.skip += PAGE_SIZE;
            if fetched < PAGE_SIZE {
                break;
            }
            if let Some(total) = report.total_records {
                if request.skip as u64 >= total {
                    break;
                }
            }
        }

        let results = report.result_count();
        tracing::debug!(module = %self.module, metric, results, "fetched {} results", results);
        self.metrics
            .observe_query(&self.module, metric, started.elapsed(), results);
        report
    }
}
