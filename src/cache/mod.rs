//! Profile cache
//!
//! Cache-aside storage for serialized public profiles, keyed `user:<id>`.
//! The cache is an optimization only: callers log a failed operation and fall
//! back to the database, so a broken backend never fails a request.
//!
//! Backends:
//! - `memory`: in-process Moka cache with per-entry TTL
//! - `redis`: shared Redis instance, every call bounded by a short timeout
//! - `none`: caching disabled

use crate::core::config::CacheConfig;
use crate::core::error::{AppError, Result};
use async_trait::async_trait;
use moka::future::Cache;
use redis::{aio::ConnectionManager, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound for a single Redis round-trip
pub const REDIS_TIMEOUT: Duration = Duration::from_secs(2);

/// Cache key for a user's public profile
pub fn profile_key(user_id: i64) -> String {
    format!("user:{}", user_id)
}

/// Key/value store for serialized profiles
#[async_trait]
pub trait ProfileCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn invalidate(&self, key: &str) -> Result<()>;

    /// Backend name, for logs
    fn backend(&self) -> &'static str;
}

/// In-process cache
pub struct MokaProfileCache {
    entries: Cache<String, (Vec<u8>, Duration)>,
}

/// Expiry policy reading the TTL stored alongside each value
struct PerEntryTtl;

impl moka::Expiry<String, (Vec<u8>, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(Vec<u8>, Duration),
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

impl MokaProfileCache {
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }
}

#[async_trait]
impl ProfileCache for MokaProfileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).await.map(|(value, _)| value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), (value, ttl)).await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed cache shared between instances.
///
/// One managed connection is opened at startup and cloned per command. It
/// reconnects by itself after a dropped link.
pub struct RedisProfileCache {
    conn: ConnectionManager,
}

impl RedisProfileCache {
    /// Connect once and check the server answers `PING`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::CacheError(format!("failed to create redis client: {}", e)))?;
        let mut conn = bounded(ConnectionManager::new(client)).await?;

        let pong: String = bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        if pong != "PONG" {
            return Err(AppError::CacheError("redis ping did not return pong".to_string()));
        }

        tracing::info!("Redis profile cache connected");
        Ok(Self { conn })
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

/// Run a Redis future under [`REDIS_TIMEOUT`]
async fn bounded<F, T>(op: F) -> Result<T>
where
    F: std::future::Future<Output = redis::RedisResult<T>>,
{
    timeout(REDIS_TIMEOUT, op)
        .await
        .map_err(|_| AppError::Timeout("redis did not answer in time".to_string()))?
        .map_err(|e| AppError::CacheError(format!("redis: {}", e)))
}

#[async_trait]
impl ProfileCache for RedisProfileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        let value: Option<Vec<u8>> = bounded(redis::cmd("GET").arg(key).query_async(&mut conn)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.connection();
        let _: () = bounded(
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .arg(value)
                .query_async(&mut conn),
        )
        .await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let mut conn = self.connection();
        let _: () = bounded(redis::cmd("DEL").arg(key).query_async(&mut conn)).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Caching disabled: every lookup misses
#[derive(Debug, Default)]
pub struct NoopProfileCache;

#[async_trait]
impl ProfileCache for NoopProfileCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}

/// Build the backend selected by configuration.
///
/// An unreachable Redis at startup degrades to no caching rather than
/// refusing to boot.
pub async fn build_profile_cache(config: &CacheConfig) -> Arc<dyn ProfileCache> {
    match config.backend.as_str() {
        "redis" => {
            let url = config.redis_url.as_deref().unwrap_or_default();
            match RedisProfileCache::connect(url).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, profile caching disabled");
                    Arc::new(NoopProfileCache)
                }
            }
        }
        "none" => Arc::new(NoopProfileCache),
        _ => Arc::new(MokaProfileCache::new(config.max_entries)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_config(backend: &str, redis_url: Option<&str>) -> CacheConfig {
        CacheConfig {
            backend: backend.to_string(),
            redis_url: redis_url.map(str::to_string),
            profile_ttl: 300,
            max_entries: 100,
        }
    }

    #[test]
    fn test_profile_key() {
        assert_eq!(profile_key(42), "user:42");
    }

    #[tokio::test]
    async fn test_moka_set_get_invalidate() {
        let cache = MokaProfileCache::new(10);
        let key = profile_key(1);

        assert!(cache.get(&key).await.unwrap().is_none());

        cache.set(&key, b"profile".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(&b"profile"[..]));

        cache.invalidate(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_moka_entry_expires() {
        let cache = MokaProfileCache::new(10);
        cache.set("user:9", b"x".to_vec(), Duration::from_millis(50)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(cache.get("user:9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoopProfileCache;
        cache.set("user:1", b"x".to_vec(), Duration::from_secs(60)).await.unwrap();

        assert!(cache.get("user:1").await.unwrap().is_none());
        assert!(cache.invalidate("user:1").await.is_ok());
    }

    #[tokio::test]
    async fn test_build_selects_backend() {
        assert_eq!(build_profile_cache(&cache_config("memory", None)).await.backend(), "memory");
        assert_eq!(build_profile_cache(&cache_config("none", None)).await.backend(), "none");
    }

    /// Runs against a live server when `CONDUCTOR_TEST_REDIS_URL` is set
    #[tokio::test]
    async fn test_redis_reuses_connection_across_operations() {
        let Ok(url) = std::env::var("CONDUCTOR_TEST_REDIS_URL") else {
            return;
        };
        let cache = RedisProfileCache::connect(&url).await.unwrap();
        let key = profile_key(i64::from(std::process::id()));

        for round in 0..3u8 {
            cache.set(&key, vec![round], Duration::from_secs(30)).await.unwrap();
            assert_eq!(cache.get(&key).await.unwrap(), Some(vec![round]));
        }

        cache.invalidate(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_noop() {
        let config = cache_config("redis", Some("redis://127.0.0.1:1"));

        let cache = build_profile_cache(&config).await;

        assert_eq!(cache.backend(), "none");
    }
}
