use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use bigdecimal::BigDecimal;
use serde_json::json;

use crate::ports::StoreError;
use crate::stellar::client::HorizonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("payment {0} already approved")]
    DuplicateApproval(String),
    #[error("payment {0} already completed")]
    DuplicateCompletion(String),
    #[error("amount mismatch: wallet reported {reported}, intent recorded {expected}")]
    AmountMismatch {
        expected: BigDecimal,
        reported: BigDecimal,
    },
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: BigDecimal,
        requested: BigDecimal,
    },
    #[error("ledger API timed out: {0}")]
    UpstreamTimeout(String),
    #[error("ledger API unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Stable machine-readable kind, used in response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidState(_) => "invalid_state",
            AppError::DuplicateApproval(_) => "duplicate_approval",
            AppError::DuplicateCompletion(_) => "duplicate_completion",
            AppError::AmountMismatch { .. } => "amount_mismatch",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::UpstreamTimeout(_) => "upstream_timeout",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Database(_) | AppError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PreconditionFailed(msg) => AppError::InvalidState(msg),
            StoreError::Duplicate(msg) => AppError::InvalidState(msg),
            StoreError::InsufficientBalance {
                available,
                requested,
            } => AppError::InsufficientBalance {
                available,
                requested,
            },
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

impl From<HorizonError> for AppError {
    fn from(err: HorizonError) -> Self {
        match err {
            HorizonError::Timeout(msg) => AppError::UpstreamTimeout(msg),
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            // Duplicates are normally resolved to no-ops in the services;
            // reaching here means the idempotent context did not match.
            AppError::DuplicateApproval(_) | AppError::DuplicateCompletion(_) => {
                StatusCode::CONFLICT
            }
            AppError::AmountMismatch { .. } | AppError::InsufficientBalance { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(AppError::InvalidState("x".into()).kind(), "invalid_state");
        assert_eq!(
            AppError::AmountMismatch {
                expected: BigDecimal::from_str("1").unwrap(),
                reported: BigDecimal::from_str("2").unwrap(),
            }
            .kind(),
            "amount_mismatch"
        );
        assert_eq!(
            AppError::UpstreamTimeout("10s elapsed".into()).kind(),
            "upstream_timeout"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let err: AppError = StoreError::NotFound("withdrawal 42".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StoreError::PreconditionFailed("not pending".into()).into();
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
