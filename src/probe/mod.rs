//! Per-request probe orchestration.
//!
//! A probe request selects the queries of one module, runs each of them as
//! its own task against a shared [`MetricList`], and optionally caches the
//! combined result for the TTL the caller asked for.

pub mod cache;
pub mod executor;

pub use cache::{cache_key, MetricCache};
pub use executor::{QueryExecutor, QueryReport, PAGE_SIZE};

use crate::core::{Config, ProbeError, QueryConfig, Result, DEFAULT_MODULE};
use crate::graph::ResourceGraph;
use crate::metrics::MetricList;
use crate::monitoring::ProbeMetrics;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Parameters of one probe request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    /// Module whose queries run
    pub module: String,
    /// Requested cache lifetime; zero disables caching
    pub cache_ttl: Duration,
}

impl ProbeRequest {
    pub fn new(module: &str, cache_ttl: Duration) -> Self {
        Self {
            module: module.to_string(),
            cache_ttl,
        }
    }

    /// Build a request from raw query parameters.
    pub fn from_params(module: Option<&str>, cache: Option<&str>) -> Result<Self> {
        let module = module.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MODULE);
        let cache_ttl = match cache {
            Some(raw) => parse_cache_duration(raw)?,
            None => Duration::ZERO,
        };
        Ok(Self::new(module, cache_ttl))
    }

    pub fn cache_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }
}

/// Parse a cache duration such as `5m` or `1h30m`.
///
/// Empty, zero and negative durations all mean no caching; a negative
/// value must still be well formed.
pub fn parse_cache_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return Ok(Duration::ZERO);
    }
    let (negative, magnitude) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let parsed =
        humantime::parse_duration(magnitude).map_err(|e| ProbeError::InvalidCacheDuration {
            value: raw.to_string(),
            message: e.to_string(),
        })?;
    Ok(if negative { Duration::ZERO } else { parsed })
}

/// Result of a probe request.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// Collected samples
    pub metrics: MetricList,
    /// Served from the cache
    pub cached: bool,
    /// Expiry of the entry written for this result
    pub cached_until: Option<DateTime<Utc>>,
}

/// Runs probe requests against a Resource Graph backend.
pub struct Prober {
    graph: Arc<dyn ResourceGraph>,
    queries: Vec<Arc<QueryConfig>>,
    subscription_filter: Vec<String>,
    cache: Arc<MetricCache>,
    metrics: ProbeMetrics,
}

impl Prober {
    pub fn new(
        graph: Arc<dyn ResourceGraph>,
        config: &Config,
        cache: Arc<MetricCache>,
        metrics: ProbeMetrics,
    ) -> Self {
        Self {
            graph,
            queries: config.queries.iter().cloned().map(Arc::new).collect(),
            subscription_filter: config.azure.subscriptions.clone(),
            cache,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<MetricCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &ProbeMetrics {
        &self.metrics
    }

    /// Serve a request from the cache or by running the module's queries.
    pub async fn probe(&self, request: &ProbeRequest) -> Result<ProbeOutcome> {
        let key = cache_key(&request.module);

        if request.cache_enabled() {
            if let Some(payload) = self.cache.get(&key) {
                match serde_json::from_slice::<MetricList>(&payload) {
                    Ok(metrics) => {
                        tracing::debug!(module = %request.module, "fetched from cache");
                        return Ok(ProbeOutcome {
                            metrics,
                            cached: true,
                            cached_until: None,
                        });
                    },
                    Err(e) => {
                        tracing::debug!(module = %request.module, error = %e, "unable to parse cache data");
                    },
                }
            }
        }

        let metrics = self.run_queries(&request.module).await?;

        let mut cached_until = None;
        if request.cache_enabled() {
            match self.store(&key, &metrics, request.cache_ttl) {
                Ok(until) => {
                    tracing::debug!(
                        module = %request.module,
                        "saved metric to cache for {}",
                        humantime::format_duration(request.cache_ttl)
                    );
                    cached_until = Some(until);
                },
                Err(e) => {
                    tracing::warn!(module = %request.module, error = %e, "unable to cache metrics");
                },
            }
        }

        Ok(ProbeOutcome {
            metrics,
            cached: false,
            cached_until,
        })
    }

    fn store(&self, key: &str, metrics: &MetricList, ttl: Duration) -> Result<DateTime<Utc>> {
        let payload = serde_json::to_vec(metrics)?;
        self.cache.set(key, Bytes::from(payload), ttl)
    }

    /// Default scope for queries without their own subscription list.
    pub async fn resolve_subscriptions(&self) -> Result<Vec<String>> {
        let subscriptions = self
            .graph
            .list_subscriptions(&self.subscription_filter)
            .await
            .map_err(|e| ProbeError::SubscriptionResolution(e.to_string()))?;
        if subscriptions.is_empty() {
            tracing::warn!("no subscriptions visible to the configured credential");
        }
        Ok(subscriptions)
    }

    /// Run every query of `module` concurrently and collect their samples.
    ///
    /// Fails before any query starts when the client cannot be prepared or
    /// the default subscriptions cannot be resolved. Individual query
    /// failures only shorten that query's contribution.
    pub async fn run_queries(&self, module: &str) -> Result<MetricList> {
        self.graph.authorize().await.map_err(|e| match e {
            ProbeError::ClientConstruction(_) => e,
            other => ProbeError::ClientConstruction(other.to_string()),
        })?;
        let defaults = self.resolve_subscriptions().await?;

        let sink = Arc::new(Mutex::new(MetricList::new()));
        let mut tasks = JoinSet::new();

        for query in self.queries.iter().filter(|q| q.module == module) {
            let executor = QueryExecutor {
                graph: Arc::clone(&self.graph),
                subscriptions: query.effective_subscriptions(&defaults),
                query: Arc::clone(query),
                module: module.to_string(),
                metrics: self.metrics.clone(),
                sink: Arc::clone(&sink),
            };
            tasks.spawn(executor.run());
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) if report.error.is_some() => failed += 1,
                Ok(_) => {},
                Err(e) => {
                    failed += 1;
                    tracing::error!(module, error = %e, "query task aborted");
                },
            }
        }
        if failed > 0 {
            tracing::warn!(module, failed, "some queries returned partial results");
        }

        let mut collected = match Arc::try_unwrap(sink) {
            Ok(list) => list.into_inner(),
            Err(shared) => shared.lock().clone(),
        };
        collected.fill_missing_labels();
        Ok(collected)
    }
}
