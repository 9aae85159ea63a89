//! Classification cache
//!
//! Capability injected into the classifier. Three stores:
//! - `RedisCache`: shared store, `GET` / `SETEX`
//! - `MemoryCache`: per-process map, expired entries dropped on read and
//!   swept in bulk as the map grows
//! - `NoopCache`: pass-through, every lookup misses

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{CacheBackend, Config};

/// Give up on the Redis store after this long at startup
pub const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Memory cache size that triggers the first sweep of expired entries
pub const MEMORY_SWEEP_THRESHOLD: usize = 1024;

/// Namespace prefix for cached classifications
pub const KEY_PREFIX: &str = "urlAnalysis:";

/// Cache key for a URL (no normalization)
pub fn cache_key(url: &str) -> String {
    format!("{}{}", KEY_PREFIX, url)
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Raw serialized value, `None` on miss
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

// ============================================================================
// REDIS
// ============================================================================

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the store; fails if it is unreachable
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SETEX")
            .arg(key)
            .arg(seconds)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    entries: HashMap<String, (String, Instant)>,
    /// Sweep expired entries once the map reaches this size
    sweep_at: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                sweep_at: MEMORY_SWEEP_THRESHOLD,
            }),
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a raw value as-is
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), now + ttl));

        if inner.entries.len() >= inner.sweep_at {
            inner.entries.retain(|_, (_, expires_at)| *expires_at > now);
            // next sweep once the live set has doubled
            inner.sweep_at = (inner.entries.len() * 2).max(MEMORY_SWEEP_THRESHOLD);
        }
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some((_, expires_at)) => Instant::now() >= *expires_at,
            None => return Ok(None),
        };

        if expired {
            inner.entries.remove(key);
            return Ok(None);
        }
        Ok(inner.entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// PASS-THROUGH
// ============================================================================

/// Stand-in when no store is configured or reachable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl ResultCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set_with_expiry(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Pick the cache store; an unreachable Redis degrades to pass-through
pub async fn from_config(config: &Config) -> Arc<dyn ResultCache> {
    match config.cache_backend {
        CacheBackend::Redis => {
            let target = format!("{}:{}/{}", config.redis_host, config.redis_port, config.redis_db);
            match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisCache::connect(&config.redis_url())).await {
                Ok(Ok(cache)) => {
                    tracing::info!("Connected to Redis at {}", target);
                    Arc::new(cache)
                }
                Ok(Err(e)) => {
                    tracing::warn!("Redis unavailable at {} ({}), caching disabled", target, e);
                    Arc::new(NoopCache)
                }
                Err(_) => {
                    tracing::warn!("Redis connect to {} timed out, caching disabled", target);
                    Arc::new(NoopCache)
                }
            }
        }
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::None => {
            tracing::info!("Cache disabled by configuration");
            Arc::new(NoopCache)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_namespaced() {
        assert_eq!(cache_key("http://a.example/"), "urlAnalysis:http://a.example/");
        assert_ne!(cache_key("http://a.example"), cache_key("http://a.example/"));
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set_with_expiry("k", "v", Duration::from_secs(3600)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set_with_expiry("k", "v", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        cache.set_with_expiry("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.name(), "none");
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..10_000 {
            cache
                .set_with_expiry(&format!("k{i}"), "v", Duration::ZERO)
                .await
                .unwrap();
        }

        assert!(cache.len() <= MEMORY_SWEEP_THRESHOLD, "{} entries left", cache.len());
    }

    #[tokio::test]
    async fn test_memory_cache_sweep_keeps_live_entries() {
        let cache = MemoryCache::new();
        cache.set_with_expiry("live", "v", Duration::from_secs(3600)).await.unwrap();
        for i in 0..MEMORY_SWEEP_THRESHOLD * 2 {
            cache
                .set_with_expiry(&format!("k{i}"), "v", Duration::ZERO)
                .await
                .unwrap();
        }

        assert_eq!(cache.get("live").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_noop() {
        // grab a free port, then close it so connects are refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config {
            cache_backend: CacheBackend::Redis,
            redis_host: "127.0.0.1".to_string(),
            redis_port: port,
            ..Config::default()
        };

        let cache = from_config(&config).await;
        assert_eq!(cache.name(), "none");
    }

    #[tokio::test]
    async fn test_backend_selection() {
        let memory = Config { cache_backend: CacheBackend::Memory, ..Config::default() };
        assert_eq!(from_config(&memory).await.name(), "memory");

        let none = Config { cache_backend: CacheBackend::None, ..Config::default() };
        assert_eq!(from_config(&none).await.name(), "none");
    }
}
