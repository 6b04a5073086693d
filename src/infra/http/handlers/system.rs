use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::ErrorReport;
use crate::infra::http::models::*;
use crate::infra::http::state::ApiState;

pub async fn root() -> impl IntoResponse {
    Json(MessageResponse::new("Restaurant API is working!"))
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "API is running",
    })
}

/// 204 when the database answers, 503 otherwise.
pub async fn ready(State(state): State<ApiState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::ready",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub async fn cache_test(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.cache.admin.probe().await)
}

pub async fn cache_info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.cache.admin.info().await)
}

pub async fn cache_clear(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.cache.admin.clear_all().await)
}
