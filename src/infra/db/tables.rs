use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, TableResize, TablesRepo},
    domain::entities::TableRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct TableRow {
    pub(super) id: i64,
    pub(super) number: i32,
    pub(super) is_available: bool,
    pub(super) current_order_id: Option<i64>,
}

impl From<TableRow> for TableRecord {
    fn from(row: TableRow) -> Self {
        Self {
            id: row.id,
            number: row.number,
            is_available: row.is_available,
            current_order_id: row.current_order_id,
        }
    }
}

#[async_trait]
impl TablesRepo for PostgresRepositories {
    async fn list_tables(&self) -> Result<Vec<TableRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TableRow>(
            "SELECT id, number, is_available, current_order_id FROM restaurant_tables ORDER BY number",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TableRecord::from).collect())
    }

    async fn list_available_tables(&self) -> Result<Vec<TableRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TableRow>(
            r#"
            SELECT id, number, is_available, current_order_id
            FROM restaurant_tables
            WHERE is_available
            ORDER BY number
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TableRecord::from).collect())
    }

    async fn ensure_tables(&self, total: i32) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO restaurant_config (id, total_tables) VALUES (1, $1) ON CONFLICT (id) DO NOTHING",
        )
        .bind(total)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM restaurant_tables")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if existing == 0 {
            sqlx::query(
                "INSERT INTO restaurant_tables (number) SELECT generate_series(1, total_tables) FROM restaurant_config WHERE id = 1",
            )
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn resize_tables(&self, total: i32) -> Result<TableResize, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let busiest: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(number) FROM (SELECT number FROM restaurant_tables WHERE NOT is_available FOR UPDATE) AS busy",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(busiest) = busiest.filter(|busiest| *busiest > total) {
            return Ok(TableResize::BelowBusyTable { busiest });
        }

        sqlx::query(
            r#"
            INSERT INTO restaurant_config (id, total_tables) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET total_tables = EXCLUDED.total_tables
            "#,
        )
        .bind(total)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO restaurant_tables (number)
            SELECT n FROM generate_series(1, $1) AS n
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(total)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            DELETE FROM restaurant_tables
            WHERE number > $1 AND is_available AND current_order_id IS NULL
            "#,
        )
        .bind(total)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(TableResize::Resized { total })
    }
}
