//! API error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use clauselens_core::{Error, ErrorKind};

/// Error returned by HTTP handlers.
///
/// Wraps the platform error and maps its kind onto a status code. Dependency
/// failures surface an opaque message; the detail stays in the logs.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.kind() {
            ErrorKind::InputValidation | ErrorKind::UnsupportedFormat => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            },
            ErrorKind::InputTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.0.to_string()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            ErrorKind::DocumentNotReady => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string())
            },
            ErrorKind::DependencyFailure => {
                tracing::error!(error = %self.0, "Dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an internal service failed while processing the request".to_string(),
                )
            },
            ErrorKind::Conflict => {
                tracing::error!(error = %self.0, "Conflict");
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            },
            ErrorKind::Internal => {
                tracing::error!(error = %self.0, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            },
        };

        (status, Json(serde_json::json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(err: Error) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(Error::InvalidInput("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(Error::InputTooLarge("big".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(Error::UnsupportedFormat("gif".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(Error::NotFound("doc".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(Error::DocumentNotReady("no embeddings".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(Error::Llm("provider".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(Error::Conflict("missing doc".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_dependency_failure_message_is_opaque() {
        let response = ApiError(Error::Store("secret connection string".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Body assembled from the opaque message, not the raw error
    }
}
