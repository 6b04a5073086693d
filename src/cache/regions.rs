//! Cache regions: which keys hold which views, for how long.
//!
//! Regions keep no in-process state. `put` failures are logged and reported as `false`;
//! `get_cached` treats unreachable stores and undecodable payloads as misses.

use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::config::CacheConfig;
use super::keys::{DISHES_ALL, ORDER_PREFIX, TABLES_ALL, TABLES_AVAILABLE, order_key};
use super::store::KvStore;
use crate::domain::entities::{DishRecord, OrderView, TableRecord};

pub(crate) const METRIC_CACHE_HIT: &str = "bistro_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "bistro_cache_miss_total";

async fn read_json<T: DeserializeOwned>(
    store: &KvStore,
    region: &'static str,
    key: &str,
) -> Option<T> {
    let Some(raw) = store.get(key).await else {
        counter!(METRIC_CACHE_MISS, "region" => region).increment(1);
        return None;
    };

    match serde_json::from_str(&raw) {
        Ok(value) => {
            counter!(METRIC_CACHE_HIT, "region" => region).increment(1);
            Some(value)
        }
        Err(err) => {
            counter!(METRIC_CACHE_MISS, "region" => region).increment(1);
            warn!(
                target: "bistro::cache",
                op = "get_cached",
                region,
                key,
                error = %err,
                "Discarding undecodable cache payload"
            );
            None
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(
    store: &KvStore,
    region: &'static str,
    key: &str,
    value: &T,
    ttl: Duration,
) -> bool {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(
                target: "bistro::cache",
                op = "put",
                region,
                key,
                error = %err,
                "Failed to serialize cache payload"
            );
            return false;
        }
    };
    store.set_with_ttl(key, &payload, ttl).await
}

async fn invalidate_keys(store: &KvStore, region: &'static str, keys: &[String]) -> bool {
    let removed = store.delete(keys).await;
    if removed.is_none() {
        warn!(
            target: "bistro::cache",
            op = "invalidate",
            region,
            keys = %keys.join(","),
            "Cache invalidation did not reach the store"
        );
    }
    removed.is_some()
}

/// The whole menu under `dishes:all`.
#[derive(Clone)]
pub struct DishesCache {
    store: KvStore,
    ttl: Duration,
}

impl DishesCache {
    const REGION: &'static str = "dishes";

    pub fn new(store: KvStore, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.dishes_ttl,
        }
    }

    pub async fn put(&self, dishes: &[DishRecord]) -> bool {
        write_json(&self.store, Self::REGION, DISHES_ALL, dishes, self.ttl).await
    }

    pub async fn get_cached(&self) -> Option<Vec<DishRecord>> {
        read_json(&self.store, Self::REGION, DISHES_ALL).await
    }

    pub async fn invalidate(&self) -> bool {
        invalidate_keys(&self.store, Self::REGION, &[DISHES_ALL.to_string()]).await
    }
}

/// Two views over the same tables: every table, and only the free ones.
///
/// Both views go stale together, so there is a single `invalidate` for the pair.
#[derive(Clone)]
pub struct TablesCache {
    store: KvStore,
    all_ttl: Duration,
    available_ttl: Duration,
}

impl TablesCache {
    const REGION: &'static str = "tables";

    pub fn new(store: KvStore, config: &CacheConfig) -> Self {
        Self {
            store,
            all_ttl: config.tables_ttl,
            available_ttl: config.available_tables_ttl,
        }
    }

    pub async fn put_all(&self, tables: &[TableRecord]) -> bool {
        write_json(&self.store, Self::REGION, TABLES_ALL, tables, self.all_ttl).await
    }

    pub async fn get_cached_all(&self) -> Option<Vec<TableRecord>> {
        read_json(&self.store, Self::REGION, TABLES_ALL).await
    }

    pub async fn put_available(&self, tables: &[TableRecord]) -> bool {
        write_json(
            &self.store,
            Self::REGION,
            TABLES_AVAILABLE,
            tables,
            self.available_ttl,
        )
        .await
    }

    pub async fn get_cached_available(&self) -> Option<Vec<TableRecord>> {
        read_json(&self.store, Self::REGION, TABLES_AVAILABLE).await
    }

    pub async fn invalidate(&self) -> bool {
        let keys = [TABLES_ALL.to_string(), TABLES_AVAILABLE.to_string()];
        invalidate_keys(&self.store, Self::REGION, &keys).await
    }
}

/// Individual orders under `order:<id>`.
#[derive(Clone)]
pub struct OrdersCache {
    store: KvStore,
    ttl: Duration,
}

impl OrdersCache {
    const REGION: &'static str = "order";

    pub fn new(store: KvStore, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.order_ttl,
        }
    }

    pub async fn put(&self, order: &OrderView) -> bool {
        write_json(
            &self.store,
            Self::REGION,
            &order_key(order.id),
            order,
            self.ttl,
        )
        .await
    }

    pub async fn get_cached(&self, order_id: i64) -> Option<OrderView> {
        read_json(&self.store, Self::REGION, &order_key(order_id)).await
    }

    pub async fn invalidate(&self, order_id: i64) -> bool {
        invalidate_keys(&self.store, Self::REGION, &[order_key(order_id)]).await
    }

    /// Drops every cached order. Returns the number of removed keys, `None` when the store
    /// could not be reached.
    pub async fn invalidate_all(&self) -> Option<u64> {
        let removed = self.store.delete_by_prefix(ORDER_PREFIX).await;
        if removed.is_none() {
            warn!(
                target: "bistro::cache",
                op = "invalidate_all",
                region = Self::REGION,
                prefix = ORDER_PREFIX,
                "Bulk order invalidation did not reach the store"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::cache::gate::AvailabilityGate;
    use crate::cache::memory::MemoryBackend;
    use crate::domain::types::OrderStatus;

    fn store_over(backend: Arc<MemoryBackend>) -> KvStore {
        KvStore::new(
            AvailabilityGate::new(backend, Duration::from_secs(1)),
            Duration::from_secs(1),
        )
    }

    fn table(number: i32, free: bool) -> TableRecord {
        TableRecord {
            id: i64::from(number),
            number,
            is_available: free,
            current_order_id: (!free).then_some(100 + i64::from(number)),
        }
    }

    fn order(id: i64) -> OrderView {
        OrderView {
            id,
            code: Some("А123".to_string()),
            table_number: 2,
            status: OrderStatus::Pending,
            created_at: datetime!(2024-02-10 12:00:00 UTC),
            waiter_id: Some(1),
            waiter_name: "ivan".to_string(),
            items: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn put_uses_region_ttls() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_over(backend.clone());
        let config = CacheConfig::default();

        let tables = TablesCache::new(store.clone(), &config);
        assert!(tables.put_all(&[table(1, true)]).await);
        assert!(tables.put_available(&[table(1, true)]).await);
        assert!(OrdersCache::new(store.clone(), &config).put(&order(9)).await);
        assert!(DishesCache::new(store, &config).put(&[]).await);

        assert_eq!(backend.ttl("tables:all"), Some(Duration::from_secs(60)));
        assert_eq!(backend.ttl("tables:available"), Some(Duration::from_secs(30)));
        assert_eq!(backend.ttl("order:9"), Some(Duration::from_secs(180)));
        assert_eq!(backend.ttl("dishes:all"), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_miss_and_is_left_alone() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("dishes:all", "{not json");
        let dishes = DishesCache::new(store_over(backend.clone()), &CacheConfig::default());

        assert_eq!(dishes.get_cached().await, None);
        assert_eq!(backend.live_keys(), vec!["dishes:all".to_string()]);
    }

    #[tokio::test]
    async fn incompatible_payload_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert("order:5", r#"{"id":"five"}"#);
        let orders = OrdersCache::new(store_over(backend), &CacheConfig::default());

        assert_eq!(orders.get_cached(5).await, None);
    }

    #[tokio::test]
    async fn empty_list_is_a_hit() {
        let backend = Arc::new(MemoryBackend::new());
        let tables = TablesCache::new(store_over(backend), &CacheConfig::default());

        assert!(tables.put_available(&[]).await);
        assert_eq!(tables.get_cached_available().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn invalidate_all_orders_keeps_other_regions() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_over(backend.clone());
        let config = CacheConfig::default();
        let orders = OrdersCache::new(store.clone(), &config);
        let tables = TablesCache::new(store, &config);

        assert!(orders.put(&order(1)).await);
        assert!(orders.put(&order(2)).await);
        assert!(tables.put_all(&[table(1, false)]).await);

        assert_eq!(orders.invalidate_all().await, Some(2));
        assert_eq!(backend.live_keys(), vec!["tables:all".to_string()]);
    }

    #[tokio::test]
    async fn invalidate_reports_unreachable_store() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_available(false);
        let store = store_over(backend);
        let config = CacheConfig::default();

        assert!(!DishesCache::new(store.clone(), &config).invalidate().await);
        assert_eq!(OrdersCache::new(store, &config).invalidate_all().await, None);
    }
}
