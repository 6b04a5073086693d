use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::repos::{MenuRepo, RepoError};
use crate::cache::{DishPopularity, DishViews, DishesCache};
use crate::domain::entities::DishRecord;
use crate::domain::error::DomainError;
use crate::domain::menu::DishDraft;

#[derive(Debug, Error)]
pub enum MenuError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("dish {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Repo(RepoError),
}

impl MenuError {
    fn from_repo(id: i64, err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<RepoError> for MenuError {
    fn from(err: RepoError) -> Self {
        Self::Repo(err)
    }
}

/// A dish together with its view counter.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PopularDish {
    pub dish: Option<DishRecord>,
    pub dish_id: i64,
    pub views: i64,
}

#[derive(Clone)]
pub struct MenuService {
    repo: Arc<dyn MenuRepo>,
    cache: DishesCache,
    views: DishViews,
}

impl MenuService {
    pub fn new(repo: Arc<dyn MenuRepo>, cache: DishesCache, views: DishViews) -> Self {
        Self { repo, cache, views }
    }

    pub async fn list_dishes(&self) -> Result<Vec<DishRecord>, MenuError> {
        if let Some(dishes) = self.cache.get_cached().await {
            return Ok(dishes);
        }

        let dishes = self.repo.list_dishes().await?;
        if !self.cache.put(&dishes).await {
            debug!(target: "bistro::application::menu", "Menu served without caching");
        }
        Ok(dishes)
    }

    pub async fn create_dish(&self, draft: DishDraft) -> Result<DishRecord, MenuError> {
        let draft = draft.normalize()?;
        let dish = self.repo.create_dish(&draft).await?;
        self.cache.invalidate().await;
        Ok(dish)
    }

    pub async fn update_dish(&self, id: i64, draft: DishDraft) -> Result<DishRecord, MenuError> {
        let draft = draft.normalize()?;
        let dish = self
            .repo
            .update_dish(id, &draft)
            .await
            .map_err(|err| MenuError::from_repo(id, err))?;
        self.cache.invalidate().await;
        Ok(dish)
    }

    pub async fn delete_dish(&self, id: i64) -> Result<(), MenuError> {
        self.repo
            .delete_dish(id)
            .await
            .map_err(|err| MenuError::from_repo(id, err))?;
        self.cache.invalidate().await;
        Ok(())
    }

    /// Counts a view of an existing dish. Returns the new total, `None` when the cache store is
    /// unavailable.
    pub async fn record_view(&self, id: i64) -> Result<Option<i64>, MenuError> {
        if self.repo.find_dish(id).await?.is_none() {
            return Err(MenuError::NotFound(id));
        }
        Ok(self.views.record_view(id).await)
    }

    pub async fn views(&self, id: i64) -> i64 {
        self.views.views(id).await
    }

    /// Most viewed dishes, joined with the current menu where the dish still exists.
    pub async fn popular(&self, limit: usize) -> Result<Vec<PopularDish>, MenuError> {
        let ranked = self.views.popular(limit).await;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let menu = self.list_dishes().await?;
        Ok(ranked
            .into_iter()
            .map(|DishPopularity { dish_id, views }| PopularDish {
                dish: menu.iter().find(|dish| dish.id == dish_id).cloned(),
                dish_id,
                views,
            })
            .collect())
    }
}
