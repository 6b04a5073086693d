use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;

use crate::{
    application::repos::{NewOrder, OrderChanges, OrderWrite, OrdersRepo, RepoError},
    domain::{
        entities::{OrderItemView, OrderLine, OrderView},
        types::{OrderStatus, UserRole},
    },
};

use super::{PostgresRepositories, map_sqlx_error, tables::TableRow};

const ORDER_HEADER_SELECT: &str = r#"
    SELECT o.id, o.code, o.table_number, o.status, o.created_at, o.waiter_id,
           COALESCE(u.username, 'Unknown') AS waiter_name
    FROM orders o
    LEFT JOIN users u ON u.id = o.waiter_id
"#;

#[derive(sqlx::FromRow)]
struct OrderHeaderRow {
    id: i64,
    code: Option<String>,
    table_number: i32,
    status: OrderStatus,
    created_at: OffsetDateTime,
    waiter_id: Option<i64>,
    waiter_name: String,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    dish_id: i64,
    dish_name: String,
    dish_price: f64,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItemView {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            dish_id: row.dish_id,
            dish_name: row.dish_name,
            dish_price: row.dish_price,
            quantity: row.quantity,
        }
    }
}

impl OrderHeaderRow {
    fn into_view(self, items: Vec<OrderItemView>) -> OrderView {
        OrderView {
            id: self.id,
            code: self.code,
            table_number: self.table_number,
            status: self.status,
            created_at: self.created_at,
            waiter_id: self.waiter_id,
            waiter_name: self.waiter_name,
            items,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LockedOrderRow {
    table_number: i32,
}

#[async_trait]
impl OrdersRepo for PostgresRepositories {
    async fn list_orders(&self, waiter_id: Option<i64>) -> Result<Vec<OrderView>, RepoError> {
        let sql = format!(
            "{ORDER_HEADER_SELECT} WHERE ($1::BIGINT IS NULL OR o.waiter_id = $1) ORDER BY o.created_at DESC, o.id DESC"
        );
        let headers = sqlx::query_as::<_, OrderHeaderRow>(&sql)
            .bind(waiter_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = headers.iter().map(|header| header.id).collect();
        let mut items = load_items(self.pool(), &ids).await?;

        Ok(headers
            .into_iter()
            .map(|header| {
                let lines = items.remove(&header.id).unwrap_or_default();
                header.into_view(lines)
            })
            .collect())
    }

    async fn find_order_view(&self, id: i64) -> Result<Option<OrderView>, RepoError> {
        let sql = format!("{ORDER_HEADER_SELECT} WHERE o.id = $1");
        let Some(header) = sqlx::query_as::<_, OrderHeaderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let mut items = load_items(self.pool(), &[id]).await?;
        let lines = items.remove(&id).unwrap_or_default();
        Ok(Some(header.into_view(lines)))
    }

    async fn create_order(&self, order: &NewOrder) -> Result<OrderWrite, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        if !user_exists(&mut tx, order.waiter_id, Some(UserRole::Waiter)).await? {
            return Ok(OrderWrite::WaiterNotFound {
                waiter_id: order.waiter_id,
            });
        }

        let Some(table) = lock_table(&mut tx, order.table_number).await? else {
            return Ok(OrderWrite::TableNotFound {
                number: order.table_number,
            });
        };
        if !table.is_available {
            return Ok(OrderWrite::TableUnavailable {
                number: order.table_number,
            });
        }

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (code, table_number, waiter_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&order.code)
        .bind(order.table_number)
        .bind(order.waiter_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        insert_items(&mut tx, order_id, &order.lines).await?;
        occupy_table(&mut tx, order.table_number, order_id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(OrderWrite::Applied { order_id })
    }

    async fn update_order(
        &self,
        id: i64,
        changes: &OrderChanges,
    ) -> Result<OrderWrite, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let Some(locked) = lock_order(&mut tx, id).await? else {
            return Ok(OrderWrite::OrderNotFound);
        };
        let mut table_number = locked.table_number;

        if let Some(target) = changes.table_number.filter(|target| *target != table_number) {
            let Some(table) = lock_table(&mut tx, target).await? else {
                return Ok(OrderWrite::TableNotFound { number: target });
            };
            if !table.is_available && table.current_order_id != Some(id) {
                return Ok(OrderWrite::TableUnavailable { number: target });
            }

            release_table(&mut tx, table_number, id).await?;
            occupy_table(&mut tx, target, id).await?;
            sqlx::query("UPDATE orders SET table_number = $2 WHERE id = $1")
                .bind(id)
                .bind(target)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            table_number = target;
        }

        if let Some(status) = changes.status {
            apply_status(&mut tx, id, table_number, status).await?;
        }

        if let Some(lines) = changes.lines.as_deref() {
            sqlx::query("DELETE FROM order_items WHERE order_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            insert_items(&mut tx, id, lines).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<OrderWrite, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let Some(locked) = lock_order(&mut tx, id).await? else {
            return Ok(OrderWrite::OrderNotFound);
        };
        apply_status(&mut tx, id, locked.table_number, status).await?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn transfer_order(&self, id: i64, waiter_id: i64) -> Result<OrderWrite, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        if lock_order(&mut tx, id).await?.is_none() {
            return Ok(OrderWrite::OrderNotFound);
        }
        if !user_exists(&mut tx, waiter_id, Some(UserRole::Waiter)).await? {
            return Ok(OrderWrite::WaiterNotFound { waiter_id });
        }

        sqlx::query("UPDATE orders SET waiter_id = $2 WHERE id = $1")
            .bind(id)
            .bind(waiter_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(OrderWrite::Applied { order_id: id })
    }

    async fn delete_order(&self, id: i64) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let Some(locked) = lock_order(&mut tx, id).await? else {
            return Ok(false);
        };
        release_table(&mut tx, locked.table_number, id).await?;

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }

    async fn delete_orphaned_orders(&self) -> Result<u64, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE restaurant_tables
            SET is_available = TRUE, current_order_id = NULL
            WHERE current_order_id IN (SELECT id FROM orders WHERE waiter_id IS NULL)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = sqlx::query("DELETE FROM orders WHERE waiter_id IS NULL")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(deleted)
    }
}

async fn load_items(
    pool: &sqlx::PgPool,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderItemView>>, RepoError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT oi.id, oi.order_id, oi.dish_id, d.name AS dish_name, d.price AS dish_price,
               oi.quantity
        FROM order_items oi
        JOIN dishes d ON d.id = oi.dish_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.order_id, oi.id
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    let mut grouped: HashMap<i64, Vec<OrderItemView>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.into());
    }
    Ok(grouped)
}

async fn user_exists(
    conn: &mut PgConnection,
    user_id: i64,
    role: Option<UserRole>,
) -> Result<bool, RepoError> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND ($2::user_role IS NULL OR role = $2))",
    )
    .bind(user_id)
    .bind(role)
    .fetch_one(conn)
    .await
    .map_err(map_sqlx_error)
}

async fn lock_order(conn: &mut PgConnection, id: i64) -> Result<Option<LockedOrderRow>, RepoError> {
    sqlx::query_as::<_, LockedOrderRow>("SELECT table_number FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(map_sqlx_error)
}

async fn lock_table(conn: &mut PgConnection, number: i32) -> Result<Option<TableRow>, RepoError> {
    sqlx::query_as::<_, TableRow>(
        r#"
        SELECT id, number, is_available, current_order_id
        FROM restaurant_tables
        WHERE number = $1
        FOR UPDATE
        "#,
    )
    .bind(number)
    .fetch_optional(conn)
    .await
    .map_err(map_sqlx_error)
}

async fn occupy_table(conn: &mut PgConnection, number: i32, order_id: i64) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE restaurant_tables SET is_available = FALSE, current_order_id = $2 WHERE number = $1",
    )
    .bind(number)
    .bind(order_id)
    .execute(conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

/// Frees the table only while it is still held by this order.
async fn release_table(conn: &mut PgConnection, number: i32, order_id: i64) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE restaurant_tables
        SET is_available = TRUE, current_order_id = NULL
        WHERE number = $1 AND (current_order_id = $2 OR current_order_id IS NULL)
        "#,
    )
    .bind(number)
    .bind(order_id)
    .execute(conn)
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

async fn apply_status(
    conn: &mut PgConnection,
    id: i64,
    table_number: i32,
    status: OrderStatus,
) -> Result<(), RepoError> {
    sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    if status.releases_table() {
        release_table(conn, table_number, id).await?;
    }
    Ok(())
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: i64,
    lines: &[OrderLine],
) -> Result<(), RepoError> {
    for line in lines {
        sqlx::query("INSERT INTO order_items (order_id, dish_id, quantity) VALUES ($1, $2, $3)")
            .bind(order_id)
            .bind(line.dish_id)
            .bind(line.quantity)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
    }
    Ok(())
}
