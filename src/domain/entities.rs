//! Domain entities mirrored from persistent storage.
//!
//! These are also the payloads stored in the cache regions, so they round-trip through JSON.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::OrderStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: i64,
    pub number: i32,
    pub is_available: bool,
    pub current_order_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: i64,
    pub dish_id: i64,
    pub dish_name: String,
    pub dish_price: f64,
    pub quantity: i32,
}

/// Fully joined order as returned to clients and cached under `order:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub code: Option<String>,
    pub table_number: i32,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub waiter_id: Option<i64>,
    pub waiter_name: String,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.dish_price * f64::from(item.quantity))
            .sum()
    }
}

/// A line of a new or replaced order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub dish_id: i64,
    pub quantity: i32,
}
