//! In-process [`KvBackend`] with expiring entries.
//!
//! Used when running without Redis in tests and local tooling. Expiry follows the tokio clock,
//! so paused-time tests can move past a TTL with `tokio::time::advance`. The availability
//! switch simulates an unreachable store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::backend::KvBackend;
use super::error::CacheError;
use super::lock::mutex_lock;

const LOCK_TARGET: &str = "bistro::cache::memory";

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggles simulated reachability. While unavailable every call fails with
    /// [`CacheError::Unavailable`]; stored entries are kept.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Writes a key without TTL, bypassing the availability switch.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "insert");
        entries.insert(
            key.into(),
            MemoryEntry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Returns every live key, bypassing the availability switch.
    pub fn live_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = mutex_lock(&self.entries, LOCK_TARGET, "live_keys");
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining time to live of a live key, bypassing the availability switch.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = mutex_lock(&self.entries, LOCK_TARGET, "ttl");
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }

    fn with_entries<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut HashMap<String, MemoryEntry>, Instant) -> T,
    ) -> Result<T, CacheError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, LOCK_TARGET, op);
        entries.retain(|_, entry| entry.is_live(now));
        Ok(f(&mut entries, now))
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_available()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.with_entries("get", |entries, _| {
            entries.get(key).map(|entry| entry.value.clone())
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.with_entries("set_ex", |entries, now| {
            entries.insert(
                key.to_string(),
                MemoryEntry {
                    value: value.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
        })
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.with_entries("del", |entries, _| {
            keys.iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count() as u64
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.with_entries("keys_with_prefix", |entries, _| {
            let mut keys: Vec<String> = entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            keys
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.with_entries("exists", |entries, _| entries.contains_key(key))
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let outcome = self.with_entries("incr", |entries, _| -> Result<i64, CacheError> {
            let entry = entries.entry(key.to_string()).or_insert(MemoryEntry {
                value: "0".to_string(),
                expires_at: None,
            });
            let current: i64 = entry.value.parse().map_err(|_| {
                CacheError::backend("ERR value is not an integer or out of range")
            })?;
            let next = current + 1;
            entry.value = next.to_string();
            Ok(next)
        })?;
        outcome
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.with_entries("expire", |entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                true
            }
            None => false,
        })
    }

    async fn has_expiry(&self, key: &str) -> Result<bool, CacheError> {
        self.with_entries("has_expiry", |entries, _| {
            entries
                .get(key)
                .is_some_and(|entry| entry.expires_at.is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_on_the_tokio_clock() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("k", "v", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn incr_keeps_existing_expiry() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.incr("c").await.unwrap(), 1);
        assert!(backend.expire("c", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(backend.incr("c").await.unwrap(), 2);
        assert_eq!(backend.ttl("c"), Some(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn has_expiry_tells_persistent_keys_apart() {
        let backend = MemoryBackend::new();
        backend.insert("plain", "1");
        backend
            .set_ex("timed", "1", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!backend.has_expiry("plain").await.unwrap());
        assert!(backend.has_expiry("timed").await.unwrap());
        assert!(!backend.has_expiry("missing").await.unwrap());
    }

    #[tokio::test]
    async fn incr_rejects_non_integer_values() {
        let backend = MemoryBackend::new();
        backend.insert("text", "hello");
        let err = backend.incr("text").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn unavailable_backend_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.insert("k", "v");
        backend.set_available(false);

        assert!(matches!(backend.ping().await, Err(CacheError::Unavailable)));
        assert!(matches!(backend.get("k").await, Err(CacheError::Unavailable)));
        assert!(matches!(
            backend.del(&["k".to_string()]).await,
            Err(CacheError::Unavailable)
        ));

        backend.set_available(true);
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn del_counts_only_existing_keys() {
        let backend = MemoryBackend::new();
        backend.insert("a", "1");
        let removed = backend
            .del(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.del(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prefix_listing_is_literal() {
        let backend = MemoryBackend::new();
        backend.insert("order:1", "{}");
        backend.insert("order:2", "{}");
        backend.insert("orders_archive", "{}");

        let keys = backend.keys_with_prefix("order:").await.unwrap();
        assert_eq!(keys, vec!["order:1".to_string(), "order:2".to_string()]);
    }
}
