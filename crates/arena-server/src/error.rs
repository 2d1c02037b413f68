//! HTTP mapping for arena errors.

use arena::session::DebateStatus;
use arena::ArenaError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<DebateStatus>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Arena(e) => match e {
                ArenaError::NotFound(_)
                | ArenaError::InvalidShareCode(_)
                | ArenaError::ArgumentNotFound(_) => StatusCode::NOT_FOUND,
                ArenaError::InvalidTransition { .. } | ArenaError::AlreadyExists(_) => {
                    StatusCode::CONFLICT
                }
                ArenaError::Validation(_)
                | ArenaError::InvalidBranchPoint { .. }
                | ArenaError::RoundOutOfOrder { .. }
                | ArenaError::InvalidStepSequence { .. } => StatusCode::BAD_REQUEST,
                ArenaError::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let current_status = match &self {
            Self::Arena(e) => e.current_status(),
            Self::BadRequest(_) => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            current_status,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ArenaError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ArenaError::InvalidShareCode("x".into()), StatusCode::NOT_FOUND),
            (ArenaError::ArgumentNotFound("x".into()), StatusCode::NOT_FOUND),
            (ArenaError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (
                ArenaError::InvalidTransition {
                    from: DebateStatus::Complete,
                    to: DebateStatus::Paused,
                },
                StatusCode::CONFLICT,
            ),
            (ArenaError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ArenaError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_conflict_body_carries_current_status() {
        let body = ErrorBody {
            error: "nope".to_string(),
            current_status: Some(DebateStatus::Paused),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["current_status"], "paused");

        let plain = serde_json::to_value(&ErrorBody {
            error: "nope".to_string(),
            current_status: None,
        })
        .unwrap();
        assert!(plain.get("current_status").is_none());
    }
}
