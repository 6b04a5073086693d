//! Key layout of the cache store.
//!
//! Each region owns a disjoint namespace so prefix deletes cannot cross regions.

pub const DISHES_NAMESPACE: &str = "dishes";
pub const TABLES_NAMESPACE: &str = "tables";
pub const ORDER_NAMESPACE: &str = "order";
pub const STATS_NAMESPACE: &str = "stats";

pub const DISHES_ALL: &str = "dishes:all";
pub const TABLES_ALL: &str = "tables:all";
pub const TABLES_AVAILABLE: &str = "tables:available";
pub const ORDER_PREFIX: &str = "order:";
pub const DISH_VIEWS_PREFIX: &str = "stats:dish:";
const DISH_VIEWS_SUFFIX: &str = ":views";

/// Key written by the cache probe endpoint.
pub const PROBE_KEY: &str = "greeting";

/// Namespaces removed by the bulk clear. Nothing outside them is ever deleted.
pub const CLEARABLE_PREFIXES: [&str; 4] = ["dishes:", "tables:", "order:", "stats:"];

/// Namespaces a rate-limit prefix must not reuse.
pub const RESERVED_NAMESPACES: [&str; 4] = [
    DISHES_NAMESPACE,
    TABLES_NAMESPACE,
    ORDER_NAMESPACE,
    STATS_NAMESPACE,
];

pub fn order_key(order_id: i64) -> String {
    format!("{ORDER_PREFIX}{order_id}")
}

pub fn dish_views_key(dish_id: i64) -> String {
    format!("{DISH_VIEWS_PREFIX}{dish_id}{DISH_VIEWS_SUFFIX}")
}

/// Extracts the dish id from a `stats:dish:<id>:views` key.
pub fn parse_dish_views_key(key: &str) -> Option<i64> {
    key.strip_prefix(DISH_VIEWS_PREFIX)?
        .strip_suffix(DISH_VIEWS_SUFFIX)?
        .parse()
        .ok()
}

pub fn rate_limit_key(prefix: &str, action: &str, identity: &str) -> String {
    format!("{prefix}:{action}:{identity}")
}
