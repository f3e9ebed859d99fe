//! Mapping of share errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use sharehub_common::Error;

/// Handler error; renders as `{"detail": ...}` with the mapped status.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// HTTP status for an error.
///
/// Remote failures keep the remote status when it is an error status.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::Authentication(_) => StatusCode::BAD_GATEWAY,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::PolicyViolation(_) => StatusCode::NOT_ACCEPTABLE,
        Error::Remote(remote) => StatusCode::from_u16(remote.status)
            .ok()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Network(_) => StatusCode::BAD_GATEWAY,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Config(_) | Error::Io(_) | Error::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        let body = Json(serde_json::json!({ "detail": self.0.detail() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_common::RemoteError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&Error::Authentication("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::PolicyViolation("x".into())),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            status_for(&Error::Timeout("x".into())),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_remote_status_passthrough() {
        let err = Error::Remote(RemoteError::new(403, "PermissionDenied", "denied"));
        assert_eq!(status_for(&err), StatusCode::FORBIDDEN);

        let odd = Error::Remote(RemoteError::new(200, "", "??"));
        assert_eq!(status_for(&odd), StatusCode::BAD_GATEWAY);
    }
}
