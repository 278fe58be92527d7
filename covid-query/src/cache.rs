//! Response cache keyed by request URI

use axum::body::Bytes;
use moka::future::Cache;
use tracing::{debug, info};

use crate::config::CacheConfig;

/// Serialized successful responses, shared by all handlers.
///
/// Only 200 bodies are stored; not-found and error responses always reach
/// the store again.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Option<Cache<String, Bytes>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = if config.enable_caching {
            let cache = Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl())
                .build();
            Some(cache)
        } else {
            None
        };

        info!(
            enabled = config.enable_caching,
            ttl_seconds = config.ttl_seconds,
            max_entries = config.max_entries,
            "response cache initialized"
        );

        Self { inner }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let cache = self.inner.as_ref()?;
        let hit = cache.get(key).await;
        if hit.is_some() {
            debug!(key, "cache hit");
        }
        hit
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        if let Some(cache) = &self.inner {
            cache.insert(key, body).await;
        }
    }

    /// Number of cached responses; pending maintenance is run first
    pub async fn entry_count(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks().await;
                cache.entry_count()
            }
            None => 0,
        }
    }
}
