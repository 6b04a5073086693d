//! Route handlers and the mapping from service errors to API errors.

pub mod menu;
pub mod orders;
pub mod system;
pub mod tables;

use axum::http::StatusCode;

use crate::application::menu::MenuError;
use crate::application::orders::OrderError;
use crate::application::repos::RepoError;
use crate::application::tables::TableError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(message),
        ),
    }
}

fn domain_to_api(err: DomainError, message: &'static str) -> ApiError {
    match err {
        DomainError::Validation { message: hint } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            message,
            Some(hint),
        ),
    }
}

pub(crate) fn menu_to_api(err: MenuError) -> ApiError {
    match err {
        MenuError::Domain(err) => domain_to_api(err, "Invalid dish"),
        MenuError::NotFound(_) => ApiError::not_found("Dish not found"),
        MenuError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn table_to_api(err: TableError) -> ApiError {
    match err {
        TableError::Domain(err) => domain_to_api(err, "Invalid restaurant configuration"),
        TableError::BusyTable { busiest, .. } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::TABLE_OCCUPIED,
            "Cannot remove an occupied table",
            Some(format!(
                "Total tables cannot go below the last occupied table (#{busiest})"
            )),
        ),
        TableError::Repo(err) => repo_to_api(err),
    }
}

pub(crate) fn order_to_api(err: OrderError) -> ApiError {
    match err {
        OrderError::Domain(err) => domain_to_api(err, "Invalid order"),
        OrderError::NotFound(_) => ApiError::not_found("Order not found"),
        OrderError::TableNotFound(_) => ApiError::not_found("Table not found"),
        OrderError::TableUnavailable(number) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::TABLE_UNAVAILABLE,
            "Table is not available",
            Some(format!("Table #{number} is occupied")),
        ),
        OrderError::WaiterNotFound(_) => ApiError::not_found("Waiter not found"),
        OrderError::CodeExhausted => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::ORDER_CODE,
            "Could not allocate an order code",
            None,
        ),
        OrderError::Repo(err) => repo_to_api(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_table_is_a_client_error() {
        let err = order_to_api(OrderError::TableUnavailable(4));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::TABLE_UNAVAILABLE);
    }

    #[test]
    fn repo_timeouts_are_service_unavailable() {
        let err = menu_to_api(MenuError::Repo(RepoError::Timeout));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn shrinking_below_busy_table_is_rejected() {
        let err = table_to_api(TableError::BusyTable {
            requested: 3,
            busiest: 7,
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::TABLE_OCCUPIED);
    }

    #[test]
    fn validation_failures_are_bad_requests() {
        let err = menu_to_api(MenuError::Domain(DomainError::validation(
            "dish name cannot be empty",
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::VALIDATION);
    }
}
