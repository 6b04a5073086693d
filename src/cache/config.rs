//! Cache configuration.
//!
//! TTLs and timeouts for the Redis-backed cache, resolved from the `[cache]`, `[redis]` and
//! `[rate_limit]` sections of `bistro.toml`.

use std::time::Duration;

const DEFAULT_DISHES_TTL_SECONDS: u64 = 300;
const DEFAULT_TABLES_TTL_SECONDS: u64 = 60;
const DEFAULT_AVAILABLE_TABLES_TTL_SECONDS: u64 = 30;
const DEFAULT_ORDER_TTL_SECONDS: u64 = 180;
const DEFAULT_PROBE_TTL_SECONDS: u64 = 60;
const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_RATE_LIMIT_PREFIX: &str = "rate_limit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub dishes_ttl: Duration,
    pub tables_ttl: Duration,
    pub available_tables_ttl: Duration,
    pub order_ttl: Duration,
    pub probe_ttl: Duration,
    /// Upper bound for establishing the Redis connection.
    pub connect_timeout: Duration,
    /// Upper bound for a single store call, the liveness probe included.
    pub operation_timeout: Duration,
    pub rate_limit_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dishes_ttl: Duration::from_secs(DEFAULT_DISHES_TTL_SECONDS),
            tables_ttl: Duration::from_secs(DEFAULT_TABLES_TTL_SECONDS),
            available_tables_ttl: Duration::from_secs(DEFAULT_AVAILABLE_TABLES_TTL_SECONDS),
            order_ttl: Duration::from_secs(DEFAULT_ORDER_TTL_SECONDS),
            probe_ttl: Duration::from_secs(DEFAULT_PROBE_TTL_SECONDS),
            connect_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECONDS),
            operation_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECONDS),
            rate_limit_prefix: DEFAULT_RATE_LIMIT_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let cache = &settings.cache;
        let redis = &settings.redis;
        let secs = |value: std::num::NonZeroU64| Duration::from_secs(value.get());

        Self {
            dishes_ttl: secs(cache.dishes_ttl_seconds),
            tables_ttl: secs(cache.tables_ttl_seconds),
            available_tables_ttl: secs(cache.available_tables_ttl_seconds),
            order_ttl: secs(cache.order_ttl_seconds),
            probe_ttl: secs(cache.probe_ttl_seconds),
            connect_timeout: secs(redis.connect_timeout_seconds),
            operation_timeout: secs(redis.operation_timeout_seconds),
            rate_limit_prefix: settings.rate_limit.key_prefix.clone(),
        }
    }
}
