use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Raw expiring key-value store.
///
/// Implementations report failures honestly; absorbing them into misses and no-ops is the job
/// of [`crate::cache::KvStore`]. Implementations must be safe to share across concurrent
/// requests without extra locking by the caller.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Lightweight liveness probe.
    async fn ping(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes the given keys and returns how many existed. An empty slice deletes nothing.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Lists every live key starting with `prefix`. The prefix is matched literally.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically increments the integer at `key`, creating it at 1. An existing expiry is kept.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// Sets the key's time to live. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Whether the key exists and carries a time to live.
    async fn has_expiry(&self, key: &str) -> Result<bool, CacheError>;
}
