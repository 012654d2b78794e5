//! Authentication error taxonomy.
//!
//! Every outcome of `Authenticator::authenticate` and `authorize_admin` other
//! than success is one of these variants. Component-level failures (timeouts,
//! malformed authority responses, key parse errors) are mapped into this enum
//! before they leave the `auth` module.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients are intentionally generic; details are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication and authorization error type.
///
/// Maps to HTTP status codes:
/// - MissingCredential, MalformedCredential, InvalidCredential, TokenExpired: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - AuthServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Token expired")]
    TokenExpired,

    /// The credential was never judged; carries the server-side reason.
    #[error("Authentication service unavailable: {0}")]
    AuthServiceUnavailable(String),

    /// Authenticated identity lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidCredential
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::AuthServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code, also used as a bounded metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::InvalidCredential => "INVALID_CREDENTIAL",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::AuthServiceUnavailable(_) => "AUTH_SERVICE_UNAVAILABLE",
            AuthError::Forbidden(_) => "FORBIDDEN",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::MissingCredential => "Missing Authorization header".to_string(),
            AuthError::MalformedCredential => "Invalid Authorization header format".to_string(),
            AuthError::InvalidCredential => "The access token is invalid or expired".to_string(),
            AuthError::TokenExpired => "The access token has expired".to_string(),
            AuthError::Forbidden(reason) => reason.clone(),
            AuthError::AuthServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "authgate.availability", reason = %reason, "Authentication service unavailable");
                "Authentication service temporarily unavailable".to_string()
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"authgate\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_does_not_leak_details() {
        assert_eq!(format!("{}", AuthError::InvalidCredential), "Invalid credential");
        assert_eq!(format!("{}", AuthError::TokenExpired), "Token expired");
        assert_eq!(
            format!("{}", AuthError::Forbidden("Admin access required".to_string())),
            "Forbidden: Admin access required"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingCredential.status_code(), 401);
        assert_eq!(AuthError::MalformedCredential.status_code(), 401);
        assert_eq!(AuthError::InvalidCredential.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::Forbidden("x".to_string()).status_code(), 403);
        assert_eq!(
            AuthError::AuthServiceUnavailable("timeout".to_string()).status_code(),
            503
        );
    }

    #[tokio::test]
    async fn test_into_response_invalid_credential() {
        let response = AuthError::InvalidCredential.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response.headers().get("WWW-Authenticate");
        assert!(www_auth.is_some());
        let www_auth_str = www_auth.unwrap().to_str().unwrap();
        assert!(www_auth_str.contains("Bearer realm=\"authgate\""));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INVALID_CREDENTIAL");
        assert_eq!(
            body_json["error"]["message"],
            "The access token is invalid or expired"
        );
    }

    #[tokio::test]
    async fn test_into_response_token_expired() {
        let response = AuthError::TokenExpired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn test_into_response_forbidden_has_no_www_authenticate() {
        let response = AuthError::Forbidden("Admin access required".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
        assert_eq!(body_json["error"]["message"], "Admin access required");
    }

    #[tokio::test]
    async fn test_into_response_service_unavailable_is_generic() {
        let error = AuthError::AuthServiceUnavailable("verify endpoint timed out".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "AUTH_SERVICE_UNAVAILABLE");
        // Generic message returned to client
        assert_eq!(
            body_json["error"]["message"],
            "Authentication service temporarily unavailable"
        );
    }
}
