//! Configuration management for graphprobe.
//!
//! This module provides configuration handling with:
//! - YAML file support (including the query list)
//! - Environment variable and CLI overrides (see `cli`)
//! - Validation and defaults

use crate::core::{ProbeError, Result};
use crate::metrics::types::{is_valid_metric_name, MetricConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Module name used when neither the request nor the query names one.
pub const DEFAULT_MODULE: &str = "default";

/// Complete configuration for graphprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Azure access configuration
    pub azure: AzureConfig,
    /// Result cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Queries, grouped by module
    pub queries: Vec<QueryConfig>,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the probe endpoint
    pub bind_address: SocketAddr,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Azure access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Resource Manager endpoint
    pub endpoint: String,
    /// Entra ID authority used for client credentials
    pub authority: String,
    /// Tenant for client credentials
    pub tenant_id: Option<String>,
    /// Application (client) id
    pub client_id: Option<String>,
    /// Application secret
    pub client_secret: Option<String>,
    /// Pre-acquired bearer token, takes precedence over client credentials
    pub access_token: Option<String>,
    /// Allow-list applied to the default subscription scope
    pub subscriptions: Vec<String>,
    /// Per-call transport timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How often expired entries are purged
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Emit JSON lines
    pub json: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Per-query detail
    Debug,
    /// Lifecycle events
    Info,
    /// Degraded results
    Warn,
    /// Failures only
    Error,
}

/// One configured query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Module the query belongs to
    #[serde(default = "default_module")]
    pub module: String,
    /// Name of the produced metric
    pub metric: String,
    /// Resource Graph query text, forwarded verbatim
    pub query: String,
    /// Own subscription scope; the request default applies when absent
    #[serde(default)]
    pub subscriptions: Option<Vec<String>>,
    /// Row extraction rules
    #[serde(flatten)]
    pub metric_config: MetricConfig,
}

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

impl QueryConfig {
    /// Create a query with default extraction rules.
    pub fn new(module: &str, metric: &str, query: &str) -> Self {
        Self {
            module: module.to_string(),
            metric: metric.to_string(),
            query: query.to_string(),
            subscriptions: None,
            metric_config: MetricConfig::default(),
        }
    }

    /// The query's own scope, or `defaults` when it declares none.
    pub fn effective_subscriptions(&self, defaults: &[String]) -> Vec<String> {
        match &self.subscriptions {
            Some(own) => own.clone(),
            None => defaults.to_vec(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            azure: AzureConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            queries: Vec::new(),
            debug: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        AzureConfig {
            endpoint: "https://management.azure.com".to_string(),
            authority: "https://login.microsoftonline.com".to_string(),
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            subscriptions: Vec::new(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            json: false,
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.cleanup_interval.is_zero() {
            return Err(ProbeError::config("cache.cleanup_interval must be greater than 0"));
        }

        if self.azure.endpoint.trim().is_empty() {
            return Err(ProbeError::config("azure.endpoint must not be empty"));
        }

        for (idx, query) in self.queries.iter().enumerate() {
            if query.metric.is_empty() {
                return Err(ProbeError::config(format!("query #{} has no metric name", idx)));
            }
            if !is_valid_metric_name(&query.metric) {
                return Err(ProbeError::config(format!(
                    "query #{} has an invalid metric name: {:?}",
                    idx, query.metric
                )));
            }
            if query.query.trim().is_empty() {
                return Err(ProbeError::config(format!(
                    "query '{}' has an empty query text",
                    query.metric
                )));
            }
            if matches!(&query.subscriptions, Some(subs) if subs.is_empty()) {
                return Err(ProbeError::config(format!(
                    "query '{}' declares an empty subscription list",
                    query.metric
                )));
            }
        }

        Ok(())
    }

    /// Queries belonging to a module, in configuration order.
    pub fn module_queries<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a QueryConfig> {
        self.queries.iter().filter(move |q| q.module == module)
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| ProbeError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set listen address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.server.bind_address = addr;
        self
    }

    /// Set the default subscription allow-list
    pub fn subscriptions(mut self, subscriptions: Vec<String>) -> Self {
        self.config.azure.subscriptions = subscriptions;
        self
    }

    /// Set a static bearer token
    pub fn access_token(mut self, token: String) -> Self {
        self.config.azure.access_token = Some(token);
        self
    }

    /// Add a query
    pub fn query(mut self, query: QueryConfig) -> Self {
        self.config.queries.push(query);
        self
    }

    /// Emit JSON logs
    pub fn json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
