use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use time::OffsetDateTime;

use crate::cache::{RateLimitDecision, RateLimiter};
use crate::config::RateLimitSettings;

use super::error::ApiError;

const METRIC_RATE_LIMIT_REJECTED: &str = "bistro_rate_limit_rejected_total";
const GLOBAL_IDENTITY: &str = "global";

static LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Requests allowed per fixed window for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(u64::from(window_seconds)),
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

impl From<&RateLimitSettings> for RateLimitPolicy {
    fn from(settings: &RateLimitSettings) -> Self {
        Self::new(settings.max_requests.get(), settings.window_seconds.get())
    }
}

/// Middleware state for one route: the shared limiter, the policy and the action name the
/// counter is keyed by.
#[derive(Clone)]
pub(super) struct RouteLimit {
    limiter: RateLimiter,
    policy: RateLimitPolicy,
    action: &'static str,
}

impl RouteLimit {
    pub(super) fn new(limiter: RateLimiter, policy: RateLimitPolicy, action: &'static str) -> Self {
        Self {
            limiter,
            policy,
            action,
        }
    }
}

pub(super) async fn enforce_rate_limit(
    State(route): State<RouteLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = client_identity(&request);
    let decision = route
        .limiter
        .check_and_increment(
            &identity,
            route.action,
            route.policy.max_requests,
            route.policy.window,
        )
        .await;

    if !decision.allowed {
        counter!(METRIC_RATE_LIMIT_REJECTED, "action" => route.action).increment(1);
        return ApiError::rate_limited(route.policy.window_seconds());
    }

    let mut response = next.run(request).await;
    attach_headers(response.headers_mut(), &decision, &route.policy);
    response
}

fn client_identity(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| GLOBAL_IDENTITY.to_string())
}

fn attach_headers(headers: &mut HeaderMap, decision: &RateLimitDecision, policy: &RateLimitPolicy) {
    let window = i64::try_from(policy.window_seconds()).unwrap_or(i64::MAX);
    let reset = OffsetDateTime::now_utc()
        .unix_timestamp()
        .saturating_add(window);

    headers.insert(LIMIT_HEADER.clone(), HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER.clone(), HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER.clone(), HeaderValue::from(reset));
}
