//! Configuration and error types shared by every part of the probe.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, QueryConfig, DEFAULT_MODULE};
pub use error::{ProbeError, Result};
