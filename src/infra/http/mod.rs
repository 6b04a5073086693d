//! HTTP surface: JSON routes over the services, each behind a fixed-window rate limit.

mod error;
mod handlers;
mod middleware;
mod models;
mod rate_limit;
mod state;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::RequestContext;
pub use rate_limit::RateLimitPolicy;
pub use state::ApiState;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{MethodRouter, delete, get, post, put},
};

use handlers::{menu, orders, system, tables};
use middleware::{log_responses, set_request_context};
use rate_limit::{RouteLimit, enforce_rate_limit};

pub fn build_router(state: ApiState) -> Router {
    let limited = |route: MethodRouter<ApiState>, action: &'static str| {
        limit_route(route, &state, action, state.rate_limit)
    };

    Router::new()
        .route("/", limited(get(system::root), "read_root"))
        .route("/health", limited(get(system::health), "health_check"))
        .route("/health/ready", get(system::ready))
        .route("/cache-test", limited(get(system::cache_test), "cache_test"))
        .route("/cache/info", limited(get(system::cache_info), "cache_info"))
        .route("/cache/clear", limited(post(system::cache_clear), "cache_clear"))
        .route(
            "/dishes",
            limited(get(menu::list_dishes), "get_dishes")
                .merge(limited(post(menu::create_dish), "create_dish")),
        )
        .route(
            "/dishes/popular",
            limited(get(menu::popular_dishes), "popular_dishes"),
        )
        .route(
            "/dishes/{id}",
            limited(put(menu::update_dish), "update_dish")
                .merge(limited(delete(menu::delete_dish), "delete_dish")),
        )
        .route(
            "/dishes/{id}/views",
            limited(get(menu::dish_views), "dish_views")
                .merge(limited(post(menu::record_view), "record_dish_view")),
        )
        .route("/tables", limited(get(tables::list_tables), "get_tables"))
        .route(
            "/tables/available",
            limited(get(tables::list_available_tables), "get_available_tables"),
        )
        .route(
            "/restaurant/config",
            limited(
                put(tables::update_restaurant_config),
                "update_restaurant_config",
            ),
        )
        .route(
            "/orders",
            limited(get(orders::list_orders), "get_orders")
                .merge(limited(post(orders::create_order), "create_order")),
        )
        .route(
            "/orders/{id}",
            limited(get(orders::get_order), "get_order")
                .merge(limited(put(orders::update_order), "update_order"))
                .merge(limited(delete(orders::delete_order), "delete_order")),
        )
        .route(
            "/orders/{id}/status",
            limited(put(orders::update_order_status), "update_order_status"),
        )
        .route(
            "/orders/{id}/transfer",
            limited(put(orders::transfer_order), "transfer_order"),
        )
        .route(
            "/cleanup/problematic-orders",
            limited(
                post(orders::cleanup_orphaned_orders),
                "cleanup_problematic_orders",
            ),
        )
        .with_state(state.clone())
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Wraps one method route with a rate limit counted under `action`.
pub fn limit_route(
    route: MethodRouter<ApiState>,
    state: &ApiState,
    action: &'static str,
    policy: RateLimitPolicy,
) -> MethodRouter<ApiState> {
    let guard = RouteLimit::new(state.cache.rate_limiter.clone(), policy, action);
    route.route_layer(axum_middleware::from_fn_with_state(
        guard,
        enforce_rate_limit,
    ))
}
