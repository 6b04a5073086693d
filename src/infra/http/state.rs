use std::sync::Arc;

use crate::application::menu::MenuService;
use crate::application::orders::OrderService;
use crate::application::repos::HealthRepo;
use crate::application::tables::TableService;
use crate::cache::CacheLayer;

use super::rate_limit::RateLimitPolicy;

#[derive(Clone)]
pub struct ApiState {
    pub menu: Arc<MenuService>,
    pub tables: Arc<TableService>,
    pub orders: Arc<OrderService>,
    pub cache: CacheLayer,
    pub health: Arc<dyn HealthRepo>,
    /// Applied to every route unless the router names its own policy.
    pub rate_limit: RateLimitPolicy,
}
