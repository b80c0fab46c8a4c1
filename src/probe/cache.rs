//! Process-wide cache of serialized probe results.

use crate::core::{ProbeError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cache key for a module's result.
pub fn cache_key(module: &str) -> String {
    format!("cache:{}", module)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Key to bytes store with per-entry expiry.
///
/// Expired entries are invisible to [`MetricCache::get`] and are dropped
/// lazily on lookup or by the janitor.
#[derive(Debug, Default)]
pub struct MetricCache {
    entries: DashMap<String, CacheEntry>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload stored under `key`, unless missing or expired.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.payload.clone()),
            Some(_) => {},
            None => return None,
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Store `payload` for `ttl`, replacing any previous entry.
    ///
    /// Returns the absolute expiry of the new entry.
    pub fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ProbeError::cache(format!("ttl out of range: {}", e)))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| ProbeError::cache("ttl out of range"))?;

        self.entries.insert(key.to_string(), CacheEntry { payload, expires_at });
        Ok(expires_at)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically purge expired entries until the handle is aborted.
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "purged expired cache entries");
                }
            }
        })
    }
}
