//! Repository traits describing persistence adapters.
//!
//! Postgres is the source of truth; services consult these only on cache misses and for
//! writes.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{DishRecord, OrderLine, OrderView, TableRecord};
use crate::domain::menu::DishDraft;
use crate::domain::types::OrderStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result of a resize of the dining room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableResize {
    Resized { total: i32 },
    /// A table numbered above the requested total is still occupied.
    BelowBusyTable { busiest: i32 },
}

/// Result of an order mutation that touches table occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderWrite {
    Applied { order_id: i64 },
    OrderNotFound,
    TableNotFound { number: i32 },
    TableUnavailable { number: i32 },
    WaiterNotFound { waiter_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub code: String,
    pub table_number: i32,
    pub waiter_id: i64,
    pub lines: Vec<OrderLine>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderChanges {
    pub table_number: Option<i32>,
    pub status: Option<OrderStatus>,
    pub lines: Option<Vec<OrderLine>>,
}

#[async_trait]
pub trait MenuRepo: Send + Sync {
    async fn list_dishes(&self) -> Result<Vec<DishRecord>, RepoError>;

    async fn find_dish(&self, id: i64) -> Result<Option<DishRecord>, RepoError>;

    async fn create_dish(&self, draft: &DishDraft) -> Result<DishRecord, RepoError>;

    /// Replaces every field of the dish. Fails with [`RepoError::NotFound`] when absent.
    async fn update_dish(&self, id: i64, draft: &DishDraft) -> Result<DishRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when absent.
    async fn delete_dish(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait TablesRepo: Send + Sync {
    /// Tables ordered by number.
    async fn list_tables(&self) -> Result<Vec<TableRecord>, RepoError>;

    async fn list_available_tables(&self) -> Result<Vec<TableRecord>, RepoError>;

    /// Creates tables `1..=total` and the restaurant configuration when none exist yet.
    async fn ensure_tables(&self, total: i32) -> Result<(), RepoError>;

    /// Grows or shrinks the dining room. Only free tables are removed.
    async fn resize_tables(&self, total: i32) -> Result<TableResize, RepoError>;
}

#[async_trait]
pub trait OrdersRepo: Send + Sync {
    /// Every order, or only the orders of one waiter.
    async fn list_orders(&self, waiter_id: Option<i64>) -> Result<Vec<OrderView>, RepoError>;

    async fn find_order_view(&self, id: i64) -> Result<Option<OrderView>, RepoError>;

    /// Inserts the order and occupies its table in one transaction. A code collision surfaces
    /// as [`RepoError::Duplicate`].
    async fn create_order(&self, order: &NewOrder) -> Result<OrderWrite, RepoError>;

    /// Applies the changes; moving tables frees the old one and occupies the new one, and a
    /// table-releasing status frees the current table.
    async fn update_order(&self, id: i64, changes: &OrderChanges)
    -> Result<OrderWrite, RepoError>;

    async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<OrderWrite, RepoError>;

    async fn transfer_order(&self, id: i64, waiter_id: i64) -> Result<OrderWrite, RepoError>;

    /// Deletes the order and frees its table. Returns `false` when the order does not exist.
    async fn delete_order(&self, id: i64) -> Result<bool, RepoError>;

    /// Deletes orders that lost their waiter and frees their tables. Returns the count.
    async fn delete_orphaned_orders(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    /// Round-trips a trivial query to the database.
    async fn ping(&self) -> Result<(), RepoError>;
}
