//! Command-line interface for graphprobe.
//!
//! Run `graphprobe --config graphprobe.yaml` and point Prometheus at
//! `/probe?module=<name>`.

use crate::api;
use crate::core::config::LoggingConfig;
use crate::core::{Config, ConfigBuilder, ProbeError, Result};
use crate::graph::ArmClient;
use crate::monitoring::ProbeMetrics;
use crate::probe::{MetricCache, Prober};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

/// Azure Resource Graph exporter for Prometheus
#[derive(Parser, Debug, Default)]
#[command(name = "graphprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GRAPHPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address of the HTTP server
    #[arg(short, long, env = "GRAPHPROBE_BIND")]
    pub bind: Option<SocketAddr>,

    /// Restrict the default scope to these subscriptions
    #[arg(long = "azure-subscription", env = "AZURE_SUBSCRIPTION_ID", value_delimiter = ',')]
    pub azure_subscription: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, env = "GRAPHPROBE_DEBUG")]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "GRAPHPROBE_LOG_JSON")]
    pub log_json: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments and environment variables
    /// 2. Config file
    /// 3. Defaults
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        if let Some(path) = &self.config {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                ProbeError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
        }

        self.apply_overrides(builder).build()
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(addr) = self.bind {
            builder = builder.bind_address(addr);
        }
        let subscriptions: Vec<String> = self
            .azure_subscription
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !subscriptions.is_empty() {
            builder = builder.subscriptions(subscriptions);
        }
        if self.log_json {
            builder = builder.json_logs(true);
        }
        builder.debug(self.debug)
    }

    /// Initialize logging.
    ///
    /// Level precedence: `RUST_LOG`, `--debug`, `GRAPHPROBE_LOG_LEVEL`, then
    /// the config file.
    pub fn init_logging(&self, logging: &LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("GRAPHPROBE_LOG_LEVEL")
            .unwrap_or_else(|_| logging.level.as_str().to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let registry = tracing_subscriber::registry().with(filter);
        let initialized = if logging.json {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
                .try_init()
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(self.debug).compact())
                .try_init()
        };

        initialized
            .map_err(|e| ProbeError::config(format!("Failed to initialize logging: {}", e)))
    }
}

/// Execute graphprobe.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config.logging)?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded configuration from: {:?}", path);
    }

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Bind address: {}", config.server.bind_address);
        println!("  Endpoint: {}", config.azure.endpoint);
        println!("  Queries: {}", config.queries.len());
        let mut modules: Vec<&str> = config.queries.iter().map(|q| q.module.as_str()).collect();
        modules.sort_unstable();
        modules.dedup();
        for module in modules {
            println!("  Module {}: {} queries", module, config.module_queries(module).count());
        }
        return Ok(());
    }

    serve(config).await
}

async fn serve(config: Config) -> Result<()> {
    let graph = Arc::new(ArmClient::new(&config.azure)?);
    let cache = Arc::new(MetricCache::new());
    let janitor = cache.spawn_janitor(config.cache.cleanup_interval);
    let metrics = ProbeMetrics::new()?;
    let prober = Arc::new(Prober::new(graph, &config, cache, metrics));

    tracing::info!(
        queries = config.queries.len(),
        "graphprobe v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = Arc::clone(&stopping);
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };

    let server = api::start_server(config.server.bind_address, prober, signal);
    tokio::pin!(server);

    // open connections get shutdown_timeout to drain
    let result = tokio::select! {
        result = &mut server => result,
        () = stopping.notified() => {
            match tokio::time::timeout(config.server.shutdown_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        "Connections still open after {}, exiting",
                        humantime::format_duration(config.server.shutdown_timeout)
                    );
                    Ok(())
                },
            }
        },
    };

    janitor.abort();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "graphprobe",
            "--bind",
            "127.0.0.1:9000",
            "--azure-subscription",
            "sub-a,sub-b",
            "--debug",
        ])
        .unwrap();

        assert_eq!(cli.bind, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(cli.azure_subscription, vec!["sub-a", "sub-b"]);
        assert!(cli.debug);
        assert!(!cli.check_config);
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  bind_address: \"127.0.0.1:8081\"\nazure:\n  subscriptions: [\"from-file\"]\nqueries:\n  - metric: azure_resources\n    query: Resources | count"
        )
        .unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            bind: Some("127.0.0.1:9999".parse().unwrap()),
            azure_subscription: vec![" sub-x ".to_string()],
            ..Cli::default()
        };
        let config = cli.load_config().await.unwrap();

        assert_eq!(config.server.bind_address.port(), 9999);
        assert_eq!(config.azure.subscriptions, vec!["sub-x".to_string()]);
        assert_eq!(config.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/graphprobe.yaml")),
            ..Cli::default()
        };
        let err = cli.load_config().await.unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }
}
