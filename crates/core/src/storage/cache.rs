//! Stale entries are evicted lazily on lookup. No sweeper, no size bound.

use crate::storage::lock::KeyLocks;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    written_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    populating: KeyLocks,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            populating: KeyLocks::new(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let fresh = entries.get(key)?.written_at.elapsed() < self.ttl;
        if fresh {
            return entries.get(key).map(|e| e.value.clone());
        }
        entries.remove(key);
        tracing::debug!(%key, "cache entry expired");
        None
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                written_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Population is serialized per key: a caller that finds the key locked waits, then
    /// re-reads the cache instead of fetching again. Errors from `fetch` are not cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::debug!(%key, "cache hit");
            return decode(key, hit);
        }

        let _guard = self.populating.lock(key).await;
        if let Some(hit) = self.get(key).await {
            tracing::debug!(%key, "cache filled by concurrent request");
            return decode(key, hit);
        }

        tracing::debug!(%key, "cache miss");
        let value = fetch().await?;
        let encoded = serde_json::to_value(&value)
            .with_context(|| format!("failed to encode cache value for {key}"))?;
        self.set(key, encoded).await;
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> anyhow::Result<T> {
    serde_json::from_value(value).with_context(|| format!("failed to decode cached value for {key}"))
}
