use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use foreman_core::ForemanError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// A domain error from the orchestrator.
    Foreman(ForemanError),
    /// The request itself was malformed.
    BadRequest(String),
}

/// JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Foreman(e) => match e {
                ForemanError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
                ForemanError::DuplicateRegistration(_) => {
                    (StatusCode::CONFLICT, "DuplicateRegistration")
                }
                ForemanError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "CapacityExceeded"),
                ForemanError::InvalidState(_) => (StatusCode::CONFLICT, "InvalidState"),
                ForemanError::NoSuitableAgent { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "NoSuitableAgent")
                }
                ForemanError::AgentExecution(_) => (StatusCode::BAD_GATEWAY, "AgentExecution"),
                ForemanError::Serialization(_) | ForemanError::Config(_) => {
                    (StatusCode::BAD_REQUEST, "BadRequest")
                }
                ForemanError::Http(_) | ForemanError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
                }
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Foreman(e) => write!(f, "{e}"),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ForemanError> for ApiError {
    fn from(err: ForemanError) -> Self {
        ApiError::Foreman(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }
        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn status(err: ForemanError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(ForemanError::not_found("agent", "x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ForemanError::DuplicateRegistration(uuid::Uuid::nil())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ForemanError::NoSuitableAgent {
                required: vec![],
                covering_roles: vec![],
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(ForemanError::AgentExecution("boom".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(ForemanError::Config("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ForemanError::Http("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
