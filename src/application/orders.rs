use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::application::repos::{NewOrder, OrderChanges, OrderWrite, OrdersRepo, RepoError};
use crate::cache::{OrdersCache, TablesCache};
use crate::domain::entities::{OrderLine, OrderView};
use crate::domain::error::DomainError;
use crate::domain::orders::{generate_order_code, validate_lines};
use crate::domain::types::OrderStatus;

const MAX_CODE_ATTEMPTS: usize = 16;
const ORDER_CODE_CONSTRAINT: &str = "orders_code_key";

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("order {0} not found")]
    NotFound(i64),
    #[error("table {0} not found")]
    TableNotFound(i32),
    #[error("table {0} is not available")]
    TableUnavailable(i32),
    #[error("waiter {0} not found")]
    WaiterNotFound(i64),
    #[error("could not allocate a unique order code")]
    CodeExhausted,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrderCommand {
    pub table_number: i32,
    pub waiter_id: i64,
    pub lines: Vec<OrderLine>,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrdersRepo>,
    orders: OrdersCache,
    tables: TablesCache,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrdersRepo>, orders: OrdersCache, tables: TablesCache) -> Self {
        Self {
            repo,
            orders,
            tables,
        }
    }

    pub async fn get(&self, id: i64) -> Result<OrderView, OrderError> {
        if let Some(order) = self.orders.get_cached(id).await {
            return Ok(order);
        }

        let order = self
            .repo
            .find_order_view(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;
        self.orders.put(&order).await;
        Ok(order)
    }

    pub async fn list(&self, waiter_id: Option<i64>) -> Result<Vec<OrderView>, OrderError> {
        Ok(self.repo.list_orders(waiter_id).await?)
    }

    pub async fn create(&self, command: CreateOrderCommand) -> Result<OrderView, OrderError> {
        validate_lines(&command.lines)?;

        let mut attempts = 0;
        let order_id = loop {
            attempts += 1;
            let code = generate_order_code(&mut rand::thread_rng());
            let new_order = NewOrder {
                code,
                table_number: command.table_number,
                waiter_id: command.waiter_id,
                lines: command.lines.clone(),
            };

            match self.repo.create_order(&new_order).await {
                Ok(outcome) => break Self::applied(outcome, 0)?,
                Err(RepoError::Duplicate { constraint })
                    if constraint == ORDER_CODE_CONSTRAINT && attempts < MAX_CODE_ATTEMPTS =>
                {
                    debug!(
                        target: "bistro::application::orders",
                        code = %new_order.code,
                        attempts,
                        "Order code collision; retrying"
                    );
                }
                Err(RepoError::Duplicate { constraint }) if constraint == ORDER_CODE_CONSTRAINT => {
                    return Err(OrderError::CodeExhausted);
                }
                Err(err) => return Err(err.into()),
            }
        };

        self.tables.invalidate().await;
        self.refresh(order_id).await
    }

    pub async fn update(&self, id: i64, changes: OrderChanges) -> Result<OrderView, OrderError> {
        if let Some(lines) = changes.lines.as_deref() {
            validate_lines(lines)?;
        }

        let outcome = self.repo.update_order(id, &changes).await?;
        Self::applied(outcome, id)?;

        self.orders.invalidate(id).await;
        self.tables.invalidate().await;
        self.refresh(id).await
    }

    pub async fn update_status(&self, id: i64, status: OrderStatus) -> Result<(), OrderError> {
        let outcome = self.repo.update_order_status(id, status).await?;
        Self::applied(outcome, id)?;

        self.orders.invalidate(id).await;
        self.tables.invalidate().await;
        Ok(())
    }

    pub async fn transfer(&self, id: i64, waiter_id: i64) -> Result<(), OrderError> {
        let outcome = self.repo.transfer_order(id, waiter_id).await?;
        Self::applied(outcome, id)?;

        self.orders.invalidate(id).await;
        self.tables.invalidate().await;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), OrderError> {
        if !self.repo.delete_order(id).await? {
            return Err(OrderError::NotFound(id));
        }

        self.orders.invalidate(id).await;
        self.tables.invalidate().await;
        Ok(())
    }

    /// Removes orders whose waiter is gone and drops every cached order.
    pub async fn cleanup_orphans(&self) -> Result<u64, OrderError> {
        let deleted = self.repo.delete_orphaned_orders().await?;

        self.orders.invalidate_all().await;
        self.tables.invalidate().await;
        Ok(deleted)
    }

    /// Loads the committed order and stores it in the cache.
    async fn refresh(&self, id: i64) -> Result<OrderView, OrderError> {
        let Some(order) = self.repo.find_order_view(id).await? else {
            warn!(
                target: "bistro::application::orders",
                order_id = id,
                "Order vanished right after it was written"
            );
            return Err(OrderError::NotFound(id));
        };
        self.orders.put(&order).await;
        Ok(order)
    }

    fn applied(outcome: OrderWrite, id: i64) -> Result<i64, OrderError> {
        match outcome {
            OrderWrite::Applied { order_id } => Ok(order_id),
            OrderWrite::OrderNotFound => Err(OrderError::NotFound(id)),
            OrderWrite::TableNotFound { number } => Err(OrderError::TableNotFound(number)),
            OrderWrite::TableUnavailable { number } => Err(OrderError::TableUnavailable(number)),
            OrderWrite::WaiterNotFound { waiter_id } => Err(OrderError::WaiterNotFound(waiter_id)),
        }
    }
}
