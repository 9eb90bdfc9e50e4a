use crate::domain::LockIdParseError;
use crate::engine::SelectionError;
use crate::orchestration::{RepositoryError, SettlementError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upstream rejected: {0}")]
    Upstream(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<LockIdParseError> for AppError {
    fn from(err: LockIdParseError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::UnknownLock(_) => AppError::NotFound(err.to_string()),
            SelectionError::WrongLedger { .. } | SelectionError::NotSettleable(_) => {
                AppError::BadRequest(err.to_string())
            }
            SelectionError::PendingQueueConflict(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        let message = err.to_string();
        match err {
            SettlementError::SettlementInProgress | SettlementError::StaleSelection(_) => {
                AppError::Conflict(message)
            }
            SettlementError::SettlementFailed(_) => AppError::Upstream(message),
            SettlementError::ItemMetadataUnavailable(_) => AppError::Unavailable(message),
            SettlementError::EmptySelection(_)
            | SettlementError::DurationOutOfRange { .. }
            | SettlementError::IllegalAction { .. }
            | SettlementError::MissingDuration
            | SettlementError::InvestmentCeilingExceeded { .. }
            | SettlementError::NotConnected
            | SettlementError::InvalidInvestment(_) => AppError::BadRequest(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Ledger;

    #[test]
    fn test_settlement_errors_map_to_statuses() {
        let status = |err: SettlementError| AppError::from(err).into_response().status();
        assert_eq!(status(SettlementError::SettlementInProgress), StatusCode::CONFLICT);
        assert_eq!(status(SettlementError::StaleSelection(vec![])), StatusCode::CONFLICT);
        assert_eq!(
            status(SettlementError::SettlementFailed("reverted".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(SettlementError::EmptySelection(Ledger::Native)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_repository_unavailable_is_503() {
        let err = AppError::from(RepositoryError::Unavailable("offline".into()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
