//! Resource Graph access.
//!
//! The probe only talks to the remote service through [`ResourceGraph`],
//! so the orchestration logic can run against the real Azure client
//! ([`ArmClient`]) or an in-process fake.

pub mod auth;
pub mod client;

pub use auth::Credential;
pub use client::ArmClient;

use crate::core::{ProbeError, Result};
use crate::metrics::ResultRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result format requested from the service.
pub const RESULT_FORMAT_OBJECT_ARRAY: &str = "objectArray";

/// One page request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Query text, forwarded verbatim
    pub query: String,
    /// Subscriptions to run against
    pub subscriptions: Vec<String>,
    /// Rows to skip
    pub skip: usize,
    /// Page size
    pub top: usize,
}

/// One page of a query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// Total rows of the whole result, when the service reports it
    #[serde(default)]
    pub total_records: Option<u64>,
    /// Rows of this page
    #[serde(default)]
    pub data: Value,
}

impl QueryPage {
    /// Page carrying the given rows.
    pub fn new(total_records: Option<u64>, rows: Vec<Value>) -> Self {
        Self {
            total_records,
            data: Value::Array(rows),
        }
    }

    /// Entries the service returned on this page, objects or not.
    pub fn item_count(&self) -> usize {
        match &self.data {
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    /// Decode the page data as object rows. Non-object entries are skipped.
    pub fn rows(&self) -> Result<Vec<&ResultRow>> {
        match &self.data {
            Value::Array(items) => Ok(items.iter().filter_map(Value::as_object).collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(ProbeError::decode(format!(
                "expected an object array, got {}",
                value_kind(other)
            ))),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Remote inventory service.
#[async_trait]
pub trait ResourceGraph: Send + Sync {
    /// Prepare the client for a probe request (credential acquisition).
    async fn authorize(&self) -> Result<()> {
        Ok(())
    }

    /// Subscriptions visible to the credential, restricted to `allow_list`
    /// when it is not empty.
    async fn list_subscriptions(&self, allow_list: &[String]) -> Result<Vec<String>>;

    /// Fetch one page of a query.
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;
}
