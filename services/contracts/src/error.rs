use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dto::{Envelope, FieldErrors, Message};

/// Every failure the API reports. Each variant renders as a `Failed` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Business-level rejection reported with the 404 envelope clients expect.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ApiError::Rejected(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(message) => {
                tracing::warn!(%message, "authentication failed");
                (StatusCode::UNAUTHORIZED, Message::Text(message))
            }
            ApiError::Rejected(message) => {
                tracing::info!(%message, "request rejected");
                (StatusCode::NOT_FOUND, Message::Text(message))
            }
            ApiError::Validation(errors) => {
                tracing::info!(fields = ?errors.keys().collect::<Vec<_>>(), "validation failed");
                (StatusCode::NOT_FOUND, Message::Fields(errors))
            }
            ApiError::BadRequest(message) => {
                tracing::warn!(%message, "malformed request");
                (StatusCode::BAD_REQUEST, Message::Text(message))
            }
            ApiError::Unexpected(error) => {
                tracing::error!(?error, "unexpected api error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Message::Text("Internal server error".to_string()),
                )
            }
        };

        (status, Json(Envelope::<()>::failed(message))).into_response()
    }
}
