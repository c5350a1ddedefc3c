use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use campus_booking::BookingError;
use campus_types::api::MessageResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate or sold-out. Reported as 400, the status clients of this
    /// API already handle for these cases.
    #[error("{0}")]
    Conflict(String),

    #[error("Service temporarily unavailable, please retry")]
    Unavailable,

    #[error("Server Error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(_) => Self::NotFound(err.to_string()),
            BookingError::Conflict(_) => Self::Conflict(err.to_string()),
            BookingError::Unauthorized => Self::Unauthorized(err.to_string()),
            BookingError::Validation(msg) => Self::BadRequest(msg),
            BookingError::Transient(_) => Self::Unavailable,
            BookingError::Internal(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            // Internal details stay in the log.
            Self::Internal(e) => error!("Internal error: {:#}", e),
            Self::Unavailable => error!("Storage unavailable after retries"),
            _ => {}
        }
        (status, Json(MessageResponse::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_booking::{Conflict, Resource};

    #[test]
    fn booking_errors_map_to_distinct_statuses() {
        let cases = [
            (BookingError::NotFound(Resource::Event), StatusCode::NOT_FOUND),
            (
                BookingError::Conflict(Conflict::FullyBooked),
                StatusCode::BAD_REQUEST,
            ),
            (BookingError::Unauthorized, StatusCode::UNAUTHORIZED),
            (BookingError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                BookingError::Transient("timeout".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BookingError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::from(BookingError::Internal(anyhow::anyhow!("disk on fire")));
        assert_eq!(err.to_string(), "Server Error");
    }
}
