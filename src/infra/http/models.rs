use serde::{Deserialize, Serialize};

use crate::application::repos::OrderChanges;
use crate::domain::entities::OrderLine;
use crate::domain::types::OrderStatus;

pub const DEFAULT_POPULAR_LIMIT: usize = 10;
pub const MAX_POPULAR_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RestaurantConfigRequest {
    pub total_tables: i32,
}

#[derive(Debug, Serialize)]
pub struct RestaurantConfigResponse {
    pub message: String,
    pub total_tables: i32,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<usize>,
}

impl PopularQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_POPULAR_LIMIT)
            .clamp(1, MAX_POPULAR_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct DishViewsResponse {
    pub dish_id: i64,
    pub views: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordViewResponse {
    pub dish_id: i64,
    /// Absent when the cache store could not count the view.
    pub views: Option<i64>,
    pub recorded: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub waiter_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub table_number: i32,
    pub waiter_id: i64,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub table_number: Option<i32>,
    pub status: Option<OrderStatus>,
    pub items: Option<Vec<OrderLine>>,
}

impl From<UpdateOrderRequest> for OrderChanges {
    fn from(request: UpdateOrderRequest) -> Self {
        Self {
            table_number: request.table_number,
            status: request.status,
            lines: request.items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub new_waiter_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    pub deleted_count: u64,
}
