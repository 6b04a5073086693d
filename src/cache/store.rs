//! The cache-facing key-value adapter.
//!
//! Every operation goes through the [`AvailabilityGate`] and a bounded timeout. Failures are
//! absorbed here: reads report absent, writes report failure, and the cause is logged and
//! counted. Nothing in this module returns an error to business logic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use super::backend::KvBackend;
use super::error::CacheError;
use super::gate::AvailabilityGate;

pub(crate) const METRIC_STORE_UNAVAILABLE: &str = "bistro_cache_store_unavailable_total";
pub(crate) const METRIC_STORE_ERROR: &str = "bistro_cache_store_error_total";

#[derive(Clone)]
pub struct KvStore {
    gate: AvailabilityGate,
    op_timeout: Duration,
}

impl KvStore {
    pub fn new(gate: AvailabilityGate, op_timeout: Duration) -> Self {
        Self { gate, op_timeout }
    }

    /// A store with no backend; every read misses and every write fails quietly.
    pub fn disabled() -> Self {
        Self::new(AvailabilityGate::disabled(), Duration::from_secs(1))
    }

    pub fn gate(&self) -> &AvailabilityGate {
        &self.gate
    }

    /// Runs one backend call behind the gate and the operation timeout.
    ///
    /// This is the only non-absorbing entry point; the cache admin uses it to tell an
    /// unavailable store from a failing one.
    pub(crate) async fn run<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, CacheError>
    where
        F: FnOnce(Arc<dyn KvBackend>) -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let backend = self.gate.acquire().await?;
        match tokio::time::timeout(self.op_timeout, call(backend)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout { op }),
        }
    }

    fn absorb<T>(op: &'static str, subject: &str, result: Result<T, CacheError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) if err.is_unavailable() => {
                counter!(METRIC_STORE_UNAVAILABLE, "op" => op).increment(1);
                debug!(
                    target: "bistro::cache",
                    op,
                    key = subject,
                    error = %err,
                    "Cache store unavailable; continuing without cache"
                );
                None
            }
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => op).increment(1);
                warn!(
                    target: "bistro::cache",
                    op,
                    key = subject,
                    error = %err,
                    error_kind = err.kind(),
                    "Cache store operation failed"
                );
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let result = self
            .run("get", |backend| async move { backend.get(key).await })
            .await;
        Self::absorb("get", key, result).flatten()
    }

    /// Returns `true` when the value was written.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let result = self
            .run("set", |backend| async move {
                backend.set_ex(key, value, ttl).await
            })
            .await;
        Self::absorb("set", key, result).is_some()
    }

    /// Deletes the keys, returning how many existed, or `None` when the store could not be
    /// reached or rejected the call.
    pub async fn delete(&self, keys: &[String]) -> Option<u64> {
        if keys.is_empty() {
            return Some(0);
        }
        let subject = keys.join(",");
        let result = self
            .run("delete", |backend| async move { backend.del(keys).await })
            .await;
        Self::absorb("delete", &subject, result)
    }

    pub async fn delete_by_prefix(&self, prefix: &str) -> Option<u64> {
        let result = self
            .run("delete_by_prefix", |backend| async move {
                let keys = backend.keys_with_prefix(prefix).await?;
                backend.del(&keys).await
            })
            .await;
        Self::absorb("delete_by_prefix", prefix, result)
    }

    pub async fn exists(&self, key: &str) -> bool {
        let result = self
            .run("exists", |backend| async move { backend.exists(key).await })
            .await;
        Self::absorb("exists", key, result).unwrap_or(false)
    }

    /// Atomic increment; `None` when the store cannot be used.
    pub async fn increment(&self, key: &str) -> Option<i64> {
        let result = self
            .run("increment", |backend| async move { backend.incr(key).await })
            .await;
        Self::absorb("increment", key, result)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        let result = self
            .run("expire", |backend| async move {
                backend.expire(key, ttl).await
            })
            .await;
        Self::absorb("expire", key, result).unwrap_or(false)
    }

    /// `None` when the store cannot be used.
    pub async fn has_expiry(&self, key: &str) -> Option<bool> {
        let result = self
            .run("has_expiry", |backend| async move {
                backend.has_expiry(key).await
            })
            .await;
        Self::absorb("has_expiry", key, result)
    }

    /// Live keys under `prefix`; empty when the store cannot be used.
    pub async fn keys_matching(&self, prefix: &str) -> Vec<String> {
        let result = self
            .run("keys_matching", |backend| async move {
                backend.keys_with_prefix(prefix).await
            })
            .await;
        Self::absorb("keys_matching", prefix, result).unwrap_or_default()
    }
}
