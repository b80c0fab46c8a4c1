//! Error types for graphprobe.

use axum::http::StatusCode;
use thiserror::Error;

/// Every failure the probe can report.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// `cache` request parameter does not parse
    #[error("invalid cache duration {value:?}: {message}")]
    InvalidCacheDuration {
        /// Raw parameter
        value: String,
        /// Parser message
        message: String,
    },

    /// Credentials could not be acquired
    #[error("unable to create resource graph client: {0}")]
    ClientConstruction(String),

    /// Default subscription scope could not be listed
    #[error("unable to resolve default subscriptions: {0}")]
    SubscriptionResolution(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success HTTP response from Azure
    #[error("Resource graph error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Response body has an unexpected shape
    #[error("Unable to decode query result: {0}")]
    Decode(String),

    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Cache write failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// Prometheus encoding failed
    #[error("Exposition error: {0}")]
    Exposition(#[from] prometheus::Error),

    /// IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A spawned task could not be joined
    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a new authentication error
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a new cache error
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidCacheDuration { .. } => "request",
            Self::ClientConstruction(_) | Self::SubscriptionResolution(_) => "orchestration",
            Self::Config(_) => "config",
            Self::Remote { .. } | Self::Network(_) => "network",
            Self::Decode(_) => "decode",
            Self::Auth(_) => "auth",
            Self::Cache(_) => "cache",
            Self::Exposition(_) => "exposition",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
        }
    }

    /// HTTP status used when the error ends a probe request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCacheDuration { .. } | Self::ClientConstruction(_) => {
                StatusCode::BAD_REQUEST
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
