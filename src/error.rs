use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON body returned for every failed request: `{"error": {"message": "..."}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Central error type; every variant maps to an HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("username already exists")]
    UsernameTaken,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("already registered for this event")]
    AlreadyRegistered,

    #[error("event is full")]
    EventFull,

    #[error("registration deadline has passed")]
    DeadlinePassed,

    #[error("cannot issue certificate without confirmed attendance")]
    AttendanceNotConfirmed,

    #[error("certificate already issued")]
    CertificateAlreadyIssued,

    #[error("certificate not yet issued")]
    NotYetIssued,

    #[error("certificate file missing from storage")]
    ArtifactMissing,

    #[error("certificate generation failed: {0}")]
    CertificateGeneration(String),

    #[error("datastore unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UsernameTaken
            | Self::EmailTaken
            | Self::AlreadyRegistered
            | Self::EventFull
            | Self::DeadlinePassed
            | Self::AttendanceNotConfirmed
            | Self::CertificateAlreadyIssued
            | Self::NotYetIssued => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::ArtifactMissing => StatusCode::NOT_FOUND,
            Self::CertificateGeneration(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_class_maps_to_409() {
        for err in [
            ApiError::UsernameTaken,
            ApiError::EmailTaken,
            ApiError::AlreadyRegistered,
            ApiError::EventFull,
            ApiError::DeadlinePassed,
            ApiError::AttendanceNotConfirmed,
            ApiError::CertificateAlreadyIssued,
            ApiError::NotYetIssued,
        ] {
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn authorization_errors_are_distinguished() {
        assert_eq!(
            ApiError::Unauthorized("missing token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("not your event").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_failure_maps_to_503() {
        let err = ApiError::Store(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
