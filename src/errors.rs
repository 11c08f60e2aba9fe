use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::{AuthError, TokenError};
use crate::registry::RegistryError;

/// Every failure the gateway reports to a client. Rendered as
/// `{"error": "<message>"}` with the matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("service '{0}' is unavailable")]
    UpstreamUnavailable(String),

    #[error("service '{0}' timed out")]
    UpstreamTimeout(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownService(name) => AppError::UnknownService(name),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Auth(AuthError::Unauthenticated) => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
            ),
            AppError::Auth(AuthError::InvalidToken(reason)) => {
                // Signature, expiry and payload failures look the same to the client.
                match reason {
                    TokenError::Signing(e) => tracing::error!("token signing failed: {}", e),
                    other => tracing::warn!(reason = ?other, "rejected access token"),
                }
                (
                    StatusCode::UNAUTHORIZED,
                    "invalid or expired token".to_string(),
                )
            }
            AppError::Auth(AuthError::Forbidden { required, .. }) => (
                StatusCode::FORBIDDEN,
                format!("{} role required", required),
            ),
            AppError::UnknownService(name) => (
                StatusCode::NOT_FOUND,
                format!("unknown service '{}'", name),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method not allowed".to_string(),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload too large".to_string(),
            ),
            AppError::UpstreamUnavailable(name) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("service '{}' is unavailable", name),
            ),
            AppError::UpstreamTimeout(name) => (
                StatusCode::BAD_GATEWAY,
                format!("service '{}' did not respond in time", name),
            ),
            AppError::Upstream(e) => {
                tracing::error!("upstream error: {}", e);
                (StatusCode::BAD_GATEWAY, "bad gateway".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = vec![
            (AppError::Auth(AuthError::Unauthenticated), StatusCode::UNAUTHORIZED),
            (
                AppError::Auth(AuthError::InvalidToken(TokenError::Expired)),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Auth(AuthError::Forbidden {
                    required: Role::Admin,
                    actual: Role::Customer,
                }),
                StatusCode::FORBIDDEN,
            ),
            (AppError::UnknownService("x".into()), StatusCode::NOT_FOUND),
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::UpstreamUnavailable("auth".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::UpstreamTimeout("auth".into()), StatusCode::BAD_GATEWAY),
            (AppError::Upstream("reset".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, body) = render(err).await;
            assert_eq!(status, expected);
            assert!(body["error"].is_string(), "missing error field: {}", body);
        }
    }

    #[tokio::test]
    async fn test_token_failures_share_one_message() {
        let (_, expired) = render(AppError::Auth(TokenError::Expired.into())).await;
        let (_, forged) = render(AppError::Auth(TokenError::InvalidSignature.into())).await;
        let (_, garbled) =
            render(AppError::Auth(TokenError::MalformedPayload("x".into()).into())).await;
        assert_eq!(expired, forged);
        assert_eq!(forged, garbled);
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let (_, body) = render(AppError::Internal(anyhow::anyhow!("db password=hunter2"))).await;
        assert_eq!(body["error"], "internal server error");
    }
}
