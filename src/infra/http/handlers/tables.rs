use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::error::ApiError;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

use super::table_to_api;

pub async fn list_tables(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let tables = state.tables.list_all().await.map_err(table_to_api)?;
    Ok(Json(tables))
}

pub async fn list_available_tables(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let tables = state.tables.list_available().await.map_err(table_to_api)?;
    Ok(Json(tables))
}

pub async fn update_restaurant_config(
    State(state): State<ApiState>,
    Json(request): Json<RestaurantConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let total_tables = state
        .tables
        .resize(request.total_tables)
        .await
        .map_err(table_to_api)?;

    Ok(Json(RestaurantConfigResponse {
        message: format!(
            "Restaurant configuration updated successfully. Total tables: {total_tables}"
        ),
        total_tables,
    }))
}
