use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::TransactionError;

/// Error sent to API clients. The body is always `error:<code>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Too many requests, retry after {retry_after}s")]
    TooManyRequests { retry_after: u64 },

    #[error("Service unavailable: {code}, retry after {retry_after}s")]
    ServiceUnavailable { code: &'static str, retry_after: u64 },

    #[error("Internal server error: {0}")]
    Internal(&'static str),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(code)
            | AppError::Forbidden(code)
            | AppError::NotFound(code)
            | AppError::Internal(code)
            | AppError::ServiceUnavailable { code, .. } => *code,
            AppError::TooManyRequests { .. } => "too-many-requests",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::TooManyRequests { retry_after }
            | AppError::ServiceUnavailable { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        let code = err.code();
        match err {
            TransactionError::InvalidAmount(_) => AppError::BadRequest(code),
            TransactionError::NotFound(_) => AppError::NotFound(code),
            TransactionError::EntranceCodeMismatch(_) | TransactionError::NotFinished(_) => {
                AppError::Forbidden(code)
            }
            TransactionError::RateLimited { retry_after } => {
                AppError::TooManyRequests { retry_after }
            }
            TransactionError::Open { retry_after } => {
                AppError::ServiceUnavailable { code, retry_after }
            }
            TransactionError::EntranceCode(_)
            | TransactionError::PurchaseId(_)
            | TransactionError::Bank(_)
            | TransactionError::DuplicateTransaction(_)
            | TransactionError::Cancelled
            | TransactionError::Expired
            | TransactionError::Inconclusive
            | TransactionError::Issuance(_) => AppError::Internal(code),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, format!("error:{}", self.code())).into_response();

        if let Some(retry_after) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}
