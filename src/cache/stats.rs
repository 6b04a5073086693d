use futures::future::join_all;
use serde::Serialize;

use super::keys::{DISH_VIEWS_PREFIX, dish_views_key, parse_dish_views_key};
use super::store::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DishPopularity {
    pub dish_id: i64,
    pub views: i64,
}

/// Per-dish view counters under `stats:dish:<id>:views`. Counters never expire.
#[derive(Clone)]
pub struct DishViews {
    store: KvStore,
}

impl DishViews {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Counts one view; returns the new total, or `None` when the store is unavailable.
    pub async fn record_view(&self, dish_id: i64) -> Option<i64> {
        self.store.increment(&dish_views_key(dish_id)).await
    }

    pub async fn views(&self, dish_id: i64) -> i64 {
        self.store
            .get(&dish_views_key(dish_id))
            .await
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Most viewed dishes first; ties are broken by dish id.
    pub async fn popular(&self, limit: usize) -> Vec<DishPopularity> {
        let keys = self.store.keys_matching(DISH_VIEWS_PREFIX).await;
        let reads = keys.iter().filter_map(|key| {
            let dish_id = parse_dish_views_key(key)?;
            Some(async move {
                let views = self
                    .store
                    .get(key)
                    .await
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                DishPopularity { dish_id, views }
            })
        });

        let mut ranked = join_all(reads).await;
        ranked.sort_by(|a, b| b.views.cmp(&a.views).then(a.dish_id.cmp(&b.dish_id)));
        ranked.truncate(limit);
        ranked
    }
}
