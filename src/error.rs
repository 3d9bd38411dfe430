use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::cart::CartError;
use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    /// Cart-level rejection based on the stock snapshot taken when the
    /// product was fetched. Recoverable: the caller adjusts the quantity.
    #[error("\"{product}\" is out of stock (available: {available})")]
    OutOfStock { product: String, available: i32 },

    /// Ledger-level rejection based on current stock. Raised during checkout
    /// re-validation or by the conditional decrement itself.
    #[error("Insufficient stock for \"{product}\" (available: {available})")]
    InsufficientStock { product: String, available: i32 },

    /// A row came back from the backend in a shape we could not decode.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Transport-level failure, distinguishable from validation failures so
    /// callers can decide between retry and abort.
    #[error("Backend unavailable")]
    BackendUnavailable(#[source] sqlx::Error),

    #[error("Database error")]
    DbError(#[source] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_) => AppError::BackendUnavailable(err),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                AppError::MalformedRecord(err.to_string())
            }
            other => AppError::DbError(other),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::OutOfStock { product, available } => {
                AppError::OutOfStock { product, available }
            }
            CartError::InvalidQuantity { quantity } => {
                AppError::BadRequest(format!("quantity must be positive, got {quantity}"))
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::OutOfStock { .. } | AppError::InsufficientStock { .. } => {
                StatusCode::CONFLICT
            }
            AppError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MalformedRecord(_) | AppError::DbError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
