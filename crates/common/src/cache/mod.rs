//! Redis cache integration
//!
//! Provides:
//! - Generic get/set operations with TTL
//! - Search and graph result caching
//!
//! The cache is optional. Read failures are logged and treated as misses,
//! write failures are logged and ignored, so a broken Redis never fails a
//! request. Results cut short by upstream rate limiting are never stored.

use crate::config::CacheSettings;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::retry::Fetched;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Redis cache client
pub struct Cache {
    connection: MultiplexedConnection,
    key_prefix: String,
    default_ttl: Duration,
}

impl Cache {
    /// Connect using the cache section of the application config
    pub async fn connect(settings: &CacheSettings) -> Result<Self> {
        let url = settings.url();
        let client = Client::open(url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection,
            key_prefix: settings.key_prefix.clone(),
            default_ttl: Duration::from_secs(settings.default_ttl_secs),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl.as_secs()).await
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let full_key = self.key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(&full_key, &json, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Get or set with a loader function
    ///
    /// `cache_name` labels the hit/miss metrics. Loaded values flagged as
    /// exhausted are returned but not stored.
    pub async fn get_or_load<T, F, Fut>(&self, cache_name: &str, key: &str, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Fetched<T>>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(cached)) => {
                metrics::record_cache(true, cache_name);
                return Ok(cached);
            }
            Ok(None) => metrics::record_cache(false, cache_name),
            Err(e) => {
                warn!(error = %e, "Cache read failed, loading from source");
                metrics::record_cache(false, cache_name);
            }
        }

        let loaded = loader().await?;

        if !should_store(&loaded) {
            debug!(key = %key, cache = cache_name, "Skipping cache write for rate-limited result");
            return Ok(loaded.into_value());
        }

        if let Err(e) = self.set(key, &loaded.value).await {
            warn!(error = %e, "Failed to cache value, continuing without cache");
        }

        Ok(loaded.into_value())
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Only complete upstream results are worth keeping for a full TTL
fn should_store<T>(loaded: &Fetched<T>) -> bool {
    loaded.is_complete()
}

/// Cache key builder helpers
pub mod keys {
    use sha2::{Digest, Sha256};

    /// Stable short digest of free-form input
    pub fn digest(input: &str) -> String {
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }

    /// Build a search query cache key
    pub fn search(query: &str, max_results: usize) -> String {
        format!("search:{}:{}", max_results, digest(query.trim()))
    }

    /// Build a graph cache key (`kind` is citations, references or network)
    pub fn graph(kind: &str, paper_id: &str, depth: u32, max_nodes: usize) -> String {
        format!("graph:{}:{}:{}:{}", kind, depth, max_nodes, digest(paper_id))
    }

    /// Build a paper details cache key
    pub fn paper(paper_id: &str) -> String {
        format!("paper:{}", digest(paper_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert!(keys::search("graph neural networks", 50).starts_with("search:50:"));
        assert!(keys::graph("network", "649def34", 1, 50).starts_with("graph:network:1:50:"));
        assert!(keys::paper("649def34").starts_with("paper:"));
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(keys::digest("abc"), keys::digest("abc"));
        assert_ne!(keys::digest("abc"), keys::digest("abd"));
        assert_eq!(keys::digest("abc").len(), 32);
    }

    #[test]
    fn test_exhausted_results_are_not_stored() {
        assert!(should_store(&Fetched::complete(vec![1, 2, 3])));

        let throttled = Fetched {
            value: Vec::<u32>::new(),
            exhausted: true,
        };
        assert!(!should_store(&throttled));
    }

    #[test]
    fn test_search_key_ignores_surrounding_whitespace() {
        assert_eq!(keys::search("  transformers ", 10), keys::search("transformers", 10));
        assert_ne!(keys::search("transformers", 10), keys::search("transformers", 20));
    }
}
