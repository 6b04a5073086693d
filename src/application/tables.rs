use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{RepoError, TableResize, TablesRepo};
use crate::cache::TablesCache;
use crate::domain::entities::TableRecord;
use crate::domain::error::DomainError;
use crate::domain::orders::validate_table_count;

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("cannot shrink to {requested} tables while table {busiest} is occupied")]
    BusyTable { requested: i32, busiest: i32 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct TableService {
    repo: Arc<dyn TablesRepo>,
    cache: TablesCache,
}

impl TableService {
    pub fn new(repo: Arc<dyn TablesRepo>, cache: TablesCache) -> Self {
        Self { repo, cache }
    }

    pub async fn list_all(&self) -> Result<Vec<TableRecord>, TableError> {
        if let Some(tables) = self.cache.get_cached_all().await {
            return Ok(tables);
        }
        let tables = self.repo.list_tables().await?;
        self.cache.put_all(&tables).await;
        Ok(tables)
    }

    pub async fn list_available(&self) -> Result<Vec<TableRecord>, TableError> {
        if let Some(tables) = self.cache.get_cached_available().await {
            return Ok(tables);
        }
        let tables = self.repo.list_available_tables().await?;
        self.cache.put_available(&tables).await;
        Ok(tables)
    }

    /// Resizes the dining room to `total` tables (1..=100).
    pub async fn resize(&self, total: i32) -> Result<i32, TableError> {
        validate_table_count(total)?;

        match self.repo.resize_tables(total).await? {
            TableResize::Resized { total } => {
                self.cache.invalidate().await;
                Ok(total)
            }
            TableResize::BelowBusyTable { busiest } => Err(TableError::BusyTable {
                requested: total,
                busiest,
            }),
        }
    }
}
