use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::application::orders::CreateOrderCommand;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

use super::order_to_api;

pub async fn list_orders(
    State(state): State<ApiState>,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .orders
        .list(query.waiter_id)
        .await
        .map_err(order_to_api)?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.orders.get(id).await.map_err(order_to_api)?;
    Ok(Json(order))
}

pub async fn create_order(
    State(state): State<ApiState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateOrderCommand {
        table_number: request.table_number,
        waiter_id: request.waiter_id,
        lines: request.items,
    };
    let order = state.orders.create(command).await.map_err(order_to_api)?;
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .orders
        .update(id, request.into())
        .await
        .map_err(order_to_api)?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orders
        .update_status(id, query.status)
        .await
        .map_err(order_to_api)?;
    Ok(Json(MessageResponse::new("Order status updated")))
}

pub async fn transfer_order(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(query): Query<TransferQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orders
        .transfer(id, query.new_waiter_id)
        .await
        .map_err(order_to_api)?;
    Ok(Json(MessageResponse::new(format!(
        "Order #{id} transferred to waiter {}",
        query.new_waiter_id
    ))))
}

pub async fn delete_order(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.orders.delete(id).await.map_err(order_to_api)?;
    Ok(Json(MessageResponse::new("Order deleted successfully")))
}

pub async fn cleanup_orphaned_orders(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted_count = state
        .orders
        .cleanup_orphans()
        .await
        .map_err(order_to_api)?;
    Ok(Json(CleanupResponse {
        message: format!(
            "Cleaned up {deleted_count} problematic orders with no waiter assigned"
        ),
        deleted_count,
    }))
}
