//! Common test utilities and fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use graphprobe_lib::api;
use graphprobe_lib::core::{Config, ProbeError, Result};
use graphprobe_lib::graph::{QueryPage, QueryRequest, ResourceGraph};
use graphprobe_lib::monitoring::ProbeMetrics;
use graphprobe_lib::probe::{MetricCache, Prober};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Subscriptions the fake reports as visible.
pub const VISIBLE_SUBSCRIPTIONS: &[&str] = &["sub-a", "sub-b"];

/// In-process Resource Graph keyed by query text.
///
/// Each known query serves `id`/`location` rows; every third row also
/// carries a `tier` column so label sets differ across rows.
#[derive(Default)]
pub struct FakeGraph {
    rows: HashMap<String, usize>,
    failing: HashSet<String>,
    fail_authorize: bool,
    fail_subscriptions: AtomicBool,
    latency: Option<Duration>,
    pub page_requests: AtomicUsize,
    pub subscription_calls: AtomicUsize,
    pub requests: Mutex<Vec<QueryRequest>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` rows for `query`.
    pub fn with_query(mut self, query: &str, rows: usize) -> Self {
        self.rows.insert(query.to_string(), rows);
        self
    }

    /// Fail every page request of `query`.
    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Fail credential acquisition.
    pub fn without_credentials(mut self) -> Self {
        self.fail_authorize = true;
        self
    }

    /// Fail subscription listing.
    pub fn without_subscriptions(self) -> Self {
        self.fail_subscriptions.store(true, Ordering::SeqCst);
        self
    }

    /// Delay every page so sibling queries overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn pages(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    /// Page requests issued for one query text.
    pub fn pages_for(&self, query: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.query == query).count()
    }
}

fn row(query: &str, idx: usize) -> Value {
    let id = format!("{}-{}", query.to_lowercase().replace(' ', "-"), idx);
    let location = ["westeurope", "northeurope", "eastus"][idx % 3];
    let mut row = json!({
        "id": id,
        "location": location,
    });
    if idx % 3 == 0 {
        row["tier"] = json!("premium");
    }
    row
}

#[async_trait]
impl ResourceGraph for FakeGraph {
    async fn authorize(&self) -> Result<()> {
        if self.fail_authorize {
            return Err(ProbeError::auth("no credential"));
        }
        Ok(())
    }

    async fn list_subscriptions(&self, allow_list: &[String]) -> Result<Vec<String>> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(ProbeError::Remote {
                status: 403,
                message: "forbidden".to_string(),
            });
        }
        Ok(VISIBLE_SUBSCRIPTIONS
            .iter()
            .map(|s| s.to_string())
            .filter(|s| allow_list.is_empty() || allow_list.contains(s))
            .collect())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&request.query) {
            return Err(ProbeError::Remote {
                status: 400,
                message: format!("bad query {:?}", request.query),
            });
        }

        let total = self.rows.get(&request.query).copied().unwrap_or(0);
        let end = (request.skip + request.top).min(total);
        let rows = (request.skip.min(end)..end)
            .map(|idx| row(&request.query, idx))
            .collect();
        Ok(QueryPage::new(Some(total as u64), rows))
    }
}

/// Prober and router over `graph`.
pub fn test_app(graph: Arc<FakeGraph>, config: &Config) -> (Router, Arc<Prober>) {
    let prober = Arc::new(Prober::new(
        graph,
        config,
        Arc::new(MetricCache::new()),
        ProbeMetrics::new().unwrap(),
    ));
    (api::router(Arc::clone(&prober)), prober)
}

/// Issue a GET and collect status, headers and body.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

/// Exposition lines of `metric`, comments excluded.
pub fn series<'a>(body: &'a str, metric: &str) -> Vec<&'a str> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(metric)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}
