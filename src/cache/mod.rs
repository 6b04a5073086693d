//! Bistro Cache System
//!
//! Redis-backed cache in front of Postgres:
//!
//! - **KV adapter** ([`KvStore`]): every call passes the [`AvailabilityGate`] and a bounded
//!   timeout; failures become misses and no-ops, never errors.
//! - **Regions**: menu, tables (two coupled views) and single orders, each with its own key
//!   namespace and TTL.
//! - **Rate limiter**: fixed-window counters on the same store, failing open.
//! - **Admin**: status snapshot, namespaced bulk clear, probe.
//!
//! ## Configuration
//!
//! ```toml
//! [redis]
//! url = "redis://redis:6379/0"
//! operation_timeout_seconds = 5
//!
//! [cache]
//! dishes_ttl_seconds = 300
//! tables_ttl_seconds = 60
//! # ... see config.rs for all options
//! ```

mod admin;
mod backend;
mod config;
mod error;
mod gate;
pub mod keys;
mod lock;
mod memory;
mod rate_limit;
mod redis_backend;
mod regions;
mod stats;
mod store;

use std::sync::Arc;

pub use admin::{CacheAdmin, CacheInfo, CacheStatus, ClearOutcome, PROBE_MESSAGE, ProbeResult};
pub use backend::KvBackend;
pub use config::CacheConfig;
pub use error::CacheError;
pub use gate::AvailabilityGate;
pub use memory::MemoryBackend;
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use redis_backend::RedisBackend;
pub use regions::{DishesCache, OrdersCache, TablesCache};
pub use stats::{DishPopularity, DishViews};
pub use store::KvStore;

/// Every cache component, wired over one shared store handle.
#[derive(Clone)]
pub struct CacheLayer {
    pub dishes: DishesCache,
    pub tables: TablesCache,
    pub orders: OrdersCache,
    pub views: DishViews,
    pub rate_limiter: RateLimiter,
    pub admin: CacheAdmin,
}

impl CacheLayer {
    pub fn new(store: KvStore, config: &CacheConfig) -> Self {
        Self {
            dishes: DishesCache::new(store.clone(), config),
            tables: TablesCache::new(store.clone(), config),
            orders: OrdersCache::new(store.clone(), config),
            views: DishViews::new(store.clone()),
            rate_limiter: RateLimiter::new(store.clone(), config.rate_limit_prefix.clone()),
            admin: CacheAdmin::new(store, config.rate_limit_prefix.clone(), config.probe_ttl),
        }
    }

    /// Wires the layer over `backend`, bounding probes and calls by the operation timeout.
    pub fn with_backend(backend: Arc<dyn KvBackend>, config: &CacheConfig) -> Self {
        let gate = AvailabilityGate::new(backend, config.operation_timeout);
        Self::new(KvStore::new(gate, config.operation_timeout), config)
    }

    /// A layer that always misses; used when Redis is switched off.
    pub fn disabled(config: &CacheConfig) -> Self {
        Self::new(KvStore::disabled(), config)
    }
}
