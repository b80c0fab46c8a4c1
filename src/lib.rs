//! graphprobe - Azure Resource Graph exporter for Prometheus.
//!
//! Every scrape of `/probe?module=<name>` runs the configured Resource
//! Graph queries of that module concurrently, pages through their
//! results, turns each row into samples and renders them in the
//! Prometheus text format. Results can be cached per module for a
//! caller-chosen lifetime.
//!
//! # Architecture
//!
//! - `graph`: Resource Graph access (ARM client and the trait it implements)
//! - `probe`: per-request orchestration, pagination and the result cache
//! - `metrics`: row-to-sample transform and exposition
//! - `monitoring`: the probe's own telemetry
//! - `api`: HTTP endpoints
//! - `core`: configuration and errors
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use graphprobe_lib::core::Config;
//! use graphprobe_lib::graph::ArmClient;
//! use graphprobe_lib::monitoring::ProbeMetrics;
//! use graphprobe_lib::probe::{MetricCache, ProbeRequest, Prober};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let graph = Arc::new(ArmClient::new(&config.azure)?);
//!     let prober = Prober::new(graph, &config, Arc::new(MetricCache::new()), ProbeMetrics::new()?);
//!     let outcome = prober.probe(&ProbeRequest::from_params(None, Some("5m"))?).await?;
//!     println!("{}", graphprobe_lib::metrics::render(&outcome.metrics)?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod cli;
pub mod core;
pub mod graph;
pub mod metrics;
pub mod monitoring;
pub mod probe;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
