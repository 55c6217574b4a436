//! Ephemeral key/value cache with per-entry TTL.
//!
//! Expired entries are hidden from readers on lookup. The periodic sweep only
//! reclaims memory; correctness never depends on it having run.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Storage behind [`Cache`]. The in-process [`MemoryCache`] is the default; an
/// external store can be plugged in by implementing this trait.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Removes expired entries and returns how many were dropped.
    async fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

/// Typed front end over a [`CacheBackend`]; values are stored as JSON.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Dropping undecodable cache entry {}: {}", key, e);
                self.backend.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.set(key, raw, ttl).await,
            Err(e) => warn!("Failed to encode cache entry {}: {}", key, e),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.backend.delete(key).await;
    }

    /// Spawns the periodic sweep. Abort the returned handle to stop it.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let removed = backend.purge_expired().await;
                if removed > 0 {
                    debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_on_read() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_string(), Duration::from_secs(10)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("k").await, None);
        // Still physically present until a sweep runs.
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "a".to_string(), Duration::from_secs(1)).await;
        cache.set("long", "b".to_string(), Duration::from_secs(600)).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.get("long").await.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_memory() {
        let backend = Arc::new(MemoryCache::new());
        let cache = Cache::new(backend.clone());
        cache.set_json("n", &5u32, Duration::from_secs(60)).await;

        let sweeper = cache.spawn_sweeper(SWEEP_INTERVAL);
        tokio::time::sleep(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        assert!(backend.is_empty().await);
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_json_round_trip_and_invalidate() {
        let cache = Cache::in_memory();
        cache
            .set_json("topics", &vec!["defi".to_string()], Duration::from_secs(60))
            .await;
        let topics: Option<Vec<String>> = cache.get_json("topics").await;
        assert_eq!(topics, Some(vec!["defi".to_string()]));

        cache.invalidate("topics").await;
        let topics: Option<Vec<String>> = cache.get_json("topics").await;
        assert!(topics.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = Cache::in_memory();
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i % 4);
                cache.set_json(&key, &i, Duration::from_secs(60)).await;
                cache.get_json::<u32>(&key).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
    }
}
