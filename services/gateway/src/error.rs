use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use settlement::SettlementError;
use thiserror::Error;
use types::errors::{ActionError, QueueError};

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::ProfileNotFound(player) => AppError::NotFound(format!("profile {}", player)),
            other => AppError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl AppError {
    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::RateLimitExceeded(_) => "rate_limit_exceeded",
            AppError::BadRequest(_) => "bad_request",
            AppError::InternalError(_) => "internal_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::NotFound(_) => "not_found",
            AppError::Queue(e) => e.reason_code(),
            AppError::Action(e) => e.reason_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable(_) | AppError::Queue(QueueError::Unavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::NotFound(_) | AppError::Queue(QueueError::NotQueued) => StatusCode::NOT_FOUND,
            AppError::Queue(QueueError::AlreadyQueued { .. }) => StatusCode::CONFLICT,
            AppError::Queue(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Action(ActionError::MatchNotFound) => StatusCode::NOT_FOUND,
            AppError::Action(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Never leak internals
            AppError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_errors_map_to_status() {
        let conflict = AppError::from(QueueError::AlreadyQueued { entrant: "player:x".into() });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "already_queued");
        assert_eq!(AppError::from(QueueError::NotQueued).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = AppError::InternalError(anyhow::anyhow!("db password wrong")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
