use std::time::Duration;

use tracing::{debug, warn};

use super::keys::rate_limit_key;
use super::store::KvStore;

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
}

impl RateLimitDecision {
    fn fail_open(limit: u32) -> Self {
        Self {
            allowed: true,
            remaining: limit,
            limit,
        }
    }
}

/// Fixed-window request counter kept in the cache store.
///
/// The window starts with the first counted request and is never extended; the counter resets
/// only when the store expires the key. A rejected request re-arms the window when the counter
/// was left without an expiry, so a lost `EXPIRE` cannot lock an identity out for good. An
/// unreachable store lets every request through.
#[derive(Clone)]
pub struct RateLimiter {
    store: KvStore,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(store: KvStore, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub async fn check_and_increment(
        &self,
        identity: &str,
        action: &str,
        max_requests: u32,
        window: Duration,
    ) -> RateLimitDecision {
        let key = rate_limit_key(&self.key_prefix, action, identity);

        let Some(count) = self.store.increment(&key).await else {
            debug!(
                target: "bistro::cache",
                op = "rate_limit",
                key = %key,
                "Rate limiter failing open"
            );
            return RateLimitDecision::fail_open(max_requests);
        };

        // Only the caller that created the counter starts the window.
        if count == 1 && !self.store.expire(&key, window).await {
            warn!(
                target: "bistro::cache",
                op = "rate_limit",
                key = %key,
                window_seconds = window.as_secs(),
                "Failed to start rate-limit window"
            );
        }

        let count = u64::try_from(count).unwrap_or(0);
        let limit = u64::from(max_requests);
        let allowed = count <= limit;

        if !allowed && self.store.has_expiry(&key).await == Some(false) {
            let rearmed = self.store.expire(&key, window).await;
            warn!(
                target: "bistro::cache",
                op = "rate_limit",
                key = %key,
                window_seconds = window.as_secs(),
                rearmed,
                "Rate-limit counter had no expiry; window re-armed"
            );
        }

        RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(count) as u32,
            limit: max_requests,
        }
    }
}
