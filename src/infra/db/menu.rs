use async_trait::async_trait;

use crate::{
    application::repos::{MenuRepo, RepoError},
    domain::{entities::DishRecord, menu::DishDraft},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DishRow {
    id: i64,
    name: String,
    description: String,
    price: f64,
    available: bool,
}

impl From<DishRow> for DishRecord {
    fn from(row: DishRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            available: row.available,
        }
    }
}

#[async_trait]
impl MenuRepo for PostgresRepositories {
    async fn list_dishes(&self) -> Result<Vec<DishRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DishRow>(
            "SELECT id, name, description, price, available FROM dishes ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DishRecord::from).collect())
    }

    async fn find_dish(&self, id: i64) -> Result<Option<DishRecord>, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            "SELECT id, name, description, price, available FROM dishes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(DishRecord::from))
    }

    async fn create_dish(&self, draft: &DishDraft) -> Result<DishRecord, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            INSERT INTO dishes (name, description, price, available)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price, available
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.available)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_dish(&self, id: i64, draft: &DishDraft) -> Result<DishRecord, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            UPDATE dishes
            SET name = $2, description = $3, price = $4, available = $5
            WHERE id = $1
            RETURNING id, name, description, price, available
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.available)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_dish(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM dishes WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
