//! Cache-aside identity lookup for vehicle bearer tokens.
//!
//! Vehicles poll at high frequency, so token resolution goes through an
//! [`IdentityCache`] before touching the primary store. The cache is never
//! authoritative and is never invalidated: a cached identity (including its
//! `is_active` flag) can be stale for up to the configured TTL.
//!
//! The cache belongs outside the process so every instance shares it. In
//! production the port is backed by an external key-value store (a pooled
//! Redis client such as `bb8-redis`); [`MemoryIdentityCache`] is the
//! single-process backend used for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Chair;

/// Failure of the cache backend. Callers treat these as misses.
#[derive(Debug)]
pub enum CacheError {
    /// Backend unavailable or timing out.
    Backend(String),
    /// Cached bytes could not be (de)serialized.
    Serialization(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Backend(msg) => write!(f, "identity cache backend failure: {}", msg),
            CacheError::Serialization(msg) => {
                write!(f, "identity cache serialization failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for CacheError {}

/// Key-value store with per-entry TTL, keyed by bearer token.
#[async_trait]
pub trait IdentityCache: Send + Sync {
    /// Read the serialized identity stored under `token`, if present and unexpired.
    async fn get(&self, token: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a serialized identity under `token` for `ttl`.
    async fn set(&self, token: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process TTL map standing in for an external key-value store.
///
/// Expired entries are dropped lazily on read and swept on write.
#[derive(Default)]
pub struct MemoryIdentityCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityCache for MemoryIdentityCache {
    async fn get(&self, token: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(token) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(token)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            entries.remove(token);
        }
        Ok(None)
    }

    async fn set(&self, token: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Backend(format!("ttl {:?} out of range", ttl)))?;

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(token.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}

/// Resolves a vehicle bearer token to its identity, cache first.
pub struct IdentityResolver {
    cache: Arc<dyn IdentityCache>,
    ttl: Duration,
    store_lookups: AtomicU64,
}

impl IdentityResolver {
    pub fn new(cache: Arc<dyn IdentityCache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            store_lookups: AtomicU64::new(0),
        }
    }

    /// Number of primary-store lookups performed so far.
    pub fn store_lookups(&self) -> u64 {
        self.store_lookups.load(Ordering::Relaxed)
    }

    /// Resolve `token`, falling back to the store on a miss and populating the
    /// cache afterwards. Unknown tokens are `Unauthorized`.
    ///
    /// Cache failures are logged and treated as misses; only store failures
    /// reach the caller.
    pub async fn resolve(&self, repo: &Repository, token: &str) -> Result<Chair, AppError> {
        match self.cached(token).await {
            Ok(Some(chair)) => return Ok(chair),
            Ok(None) => {}
            Err(e) => tracing::warn!("Identity cache read failed: {}", e),
        }

        self.store_lookups.fetch_add(1, Ordering::Relaxed);
        let chair = repo
            .find_chair_by_token(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid access token".to_string()))?;

        if let Err(e) = self.populate(token, &chair).await {
            tracing::warn!("Identity cache write failed: {}", e);
        }

        Ok(chair)
    }

    async fn cached(&self, token: &str) -> Result<Option<Chair>, CacheError> {
        let Some(bytes) = self.cache.get(token).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    async fn populate(&self, token: &str, chair: &Chair) -> Result<(), CacheError> {
        let bytes =
            serde_json::to_vec(chair).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache.set(token, bytes, self.ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_hit_within_ttl() {
        let cache = MemoryIdentityCache::new();
        cache
            .set("token-a", b"payload".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("token-a").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_memory_cache_miss_for_unknown_key() {
        let cache = MemoryIdentityCache::new();
        assert!(cache.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_expires() {
        let cache = MemoryIdentityCache::new();
        cache
            .set("token-b", b"payload".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("token-b").await.unwrap().is_none());
        assert!(cache.entries.read().await.get("token-b").is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_overwrite_extends_entry() {
        let cache = MemoryIdentityCache::new();
        cache
            .set("token-c", b"old".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("token-c", b"new".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("token-c").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"new"[..]));
    }

    /// Backend that fails every call, to check failures degrade to misses.
    struct BrokenCache;

    #[async_trait]
    impl IdentityCache for BrokenCache {
        async fn get(&self, _token: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _token: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_broken_cache_reports_backend_error() {
        let resolver = IdentityResolver::new(Arc::new(BrokenCache), Duration::from_secs(1));
        let err = resolver.cached("any").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_serialization_error() {
        let cache = Arc::new(MemoryIdentityCache::new());
        cache
            .set("token-d", b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let resolver = IdentityResolver::new(cache, Duration::from_secs(60));
        let err = resolver.cached("token-d").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
