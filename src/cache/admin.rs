//! Operational view over the whole cache: status snapshot, namespaced bulk clear and the
//! round-trip probe.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::error::CacheError;
use super::keys::{
    CLEARABLE_PREFIXES, DISHES_ALL, ORDER_PREFIX, PROBE_KEY, TABLES_ALL, TABLES_AVAILABLE,
};
use super::store::KvStore;

pub const PROBE_MESSAGE: &str = "Hello from Redis!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Available,
    Unavailable,
    Error,
}

/// Aggregate cache state. Counters are only present when the store answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub status: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dishes_cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables_cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tables_cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_orders_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_keys_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_keys_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheInfo {
    fn without_counts(status: CacheStatus, error: Option<String>) -> Self {
        Self {
            status,
            dishes_cached: None,
            tables_cached: None,
            available_tables_cached: None,
            cached_orders_count: None,
            stats_keys_count: None,
            rate_limit_keys_count: None,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub cached: bool,
    pub message: String,
    pub redis_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    pub cleared: bool,
    pub removed_keys: u64,
}

#[derive(Clone)]
pub struct CacheAdmin {
    store: KvStore,
    rate_limit_prefix: String,
    probe_ttl: Duration,
}

impl CacheAdmin {
    pub fn new(store: KvStore, rate_limit_prefix: impl Into<String>, probe_ttl: Duration) -> Self {
        Self {
            store,
            rate_limit_prefix: rate_limit_prefix.into(),
            probe_ttl,
        }
    }

    pub async fn info(&self) -> CacheInfo {
        let rate_prefix = format!("{}:", self.rate_limit_prefix);
        let snapshot = self
            .store
            .run("info", |backend| async move {
                Ok(CacheInfo {
                    status: CacheStatus::Available,
                    dishes_cached: Some(backend.exists(DISHES_ALL).await?),
                    tables_cached: Some(backend.exists(TABLES_ALL).await?),
                    available_tables_cached: Some(backend.exists(TABLES_AVAILABLE).await?),
                    cached_orders_count: Some(backend.keys_with_prefix(ORDER_PREFIX).await?.len()),
                    stats_keys_count: Some(backend.keys_with_prefix("stats:").await?.len()),
                    rate_limit_keys_count: Some(
                        backend.keys_with_prefix(&rate_prefix).await?.len(),
                    ),
                    error: None,
                })
            })
            .await;

        match snapshot {
            Ok(info) => info,
            Err(CacheError::Unavailable) => {
                CacheInfo::without_counts(CacheStatus::Unavailable, None)
            }
            Err(err) => {
                warn!(
                    target: "bistro::cache",
                    op = "info",
                    error = %err,
                    "Cache status snapshot failed"
                );
                CacheInfo::without_counts(CacheStatus::Error, Some(err.to_string()))
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.store.gate().is_available().await
    }

    /// Deletes every key in the cache namespaces and nothing else.
    pub async fn clear_all(&self) -> ClearOutcome {
        let mut outcome = ClearOutcome {
            cleared: true,
            removed_keys: 0,
        };

        for prefix in CLEARABLE_PREFIXES {
            match self.store.delete_by_prefix(prefix).await {
                Some(removed) => outcome.removed_keys += removed,
                None => outcome.cleared = false,
            }
        }

        info!(
            target: "bistro::cache",
            op = "clear_all",
            cleared = outcome.cleared,
            removed_keys = outcome.removed_keys,
            "Cache namespaces cleared"
        );
        outcome
    }

    /// Reads the probe key, writing it when absent.
    pub async fn probe(&self) -> ProbeResult {
        let ttl = self.probe_ttl;
        let result = self
            .store
            .run("probe", |backend| async move {
                if let Some(message) = backend.get(PROBE_KEY).await? {
                    return Ok((true, message));
                }
                backend.set_ex(PROBE_KEY, PROBE_MESSAGE, ttl).await?;
                Ok((false, PROBE_MESSAGE.to_string()))
            })
            .await;

        match result {
            Ok((cached, message)) => ProbeResult {
                cached,
                message,
                redis_available: true,
            },
            Err(CacheError::Unavailable) => ProbeResult {
                cached: false,
                message: "Redis is unavailable".to_string(),
                redis_available: false,
            },
            Err(err) => ProbeResult {
                cached: false,
                message: format!("Redis error: {err}"),
                redis_available: false,
            },
        }
    }
}
