use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::domain::menu::DishDraft;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

use super::menu_to_api;

pub async fn list_dishes(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let dishes = state.menu.list_dishes().await.map_err(menu_to_api)?;
    Ok(Json(dishes))
}

pub async fn create_dish(
    State(state): State<ApiState>,
    Json(draft): Json<DishDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let dish = state.menu.create_dish(draft).await.map_err(menu_to_api)?;
    Ok(Json(dish))
}

pub async fn update_dish(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(draft): Json<DishDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let dish = state
        .menu
        .update_dish(id, draft)
        .await
        .map_err(menu_to_api)?;
    Ok(Json(dish))
}

pub async fn delete_dish(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.menu.delete_dish(id).await.map_err(menu_to_api)?;
    Ok(Json(MessageResponse::new("Dish deleted")))
}

pub async fn record_view(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.menu.record_view(id).await.map_err(menu_to_api)?;
    Ok(Json(RecordViewResponse {
        dish_id: id,
        views,
        recorded: views.is_some(),
    }))
}

pub async fn dish_views(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let views = state.menu.views(id).await;
    Ok(Json(DishViewsResponse { dish_id: id, views }))
}

pub async fn popular_dishes(
    State(state): State<ApiState>,
    Query(query): Query<PopularQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let popular = state
        .menu
        .popular(query.limit())
        .await
        .map_err(menu_to_api)?;
    Ok(Json(popular))
}
