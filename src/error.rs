// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// The authentication variants mirror the protocol outcomes: provider-side
/// failures are never retried here (the caller restarts the handshake), and
/// every remember-me failure except `CookieTheftDetected` just means the user
/// falls back to an interactive login.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    // ─── OAuth handshake ─────────────────────────────────────────
    #[error("OAuth provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("OAuth provider rejected the exchange: {0}")]
    ProviderRejected(String),

    #[error("Malformed identity payload: {0}")]
    MalformedIdentityPayload(String),

    // ─── Remember-me validation ──────────────────────────────────
    #[error("Remember-me cookie did not contain exactly three fields")]
    MalformedCookie,

    #[error("No user exists for the presented id")]
    UnknownPrincipal,

    #[error("No persistent token found for the presented series")]
    NoSuchSeries,

    #[error("Remember-me token has expired")]
    TokenExpired,

    #[error("Remember-me token mismatch; implies previous cookie theft")]
    CookieTheftDetected,

    // ─── Storage / plumbing ──────────────────────────────────────
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for remember-me failures that should silently fall back to
    /// interactive login (no alarm, no error surfaced to the user).
    pub fn is_remember_me_soft_failure(&self) -> bool {
        matches!(
            self,
            AppError::MalformedCookie
                | AppError::UnknownPrincipal
                | AppError::NoSuchSeries
                | AppError::TokenExpired
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::ProviderUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "provider_unavailable",
                Some(msg.clone()),
            ),
            AppError::ProviderRejected(msg) => (
                StatusCode::UNAUTHORIZED,
                "provider_rejected",
                Some(msg.clone()),
            ),
            AppError::MalformedIdentityPayload(msg) => (
                StatusCode::UNAUTHORIZED,
                "malformed_identity_payload",
                Some(msg.clone()),
            ),
            AppError::MalformedCookie
            | AppError::UnknownPrincipal
            | AppError::NoSuchSeries
            | AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "login_required", None),
            // Surfaced distinctly so the frontend can warn the user that all
            // their persistent sessions were revoked.
            AppError::CookieTheftDetected => (StatusCode::FORBIDDEN, "cookie_theft_detected", None),
            AppError::AlreadyExists(msg) => {
                (StatusCode::CONFLICT, "already_exists", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_failures_fall_back_to_login() {
        assert!(AppError::MalformedCookie.is_remember_me_soft_failure());
        assert!(AppError::UnknownPrincipal.is_remember_me_soft_failure());
        assert!(AppError::NoSuchSeries.is_remember_me_soft_failure());
        assert!(AppError::TokenExpired.is_remember_me_soft_failure());
        assert!(!AppError::CookieTheftDetected.is_remember_me_soft_failure());
        assert!(!AppError::Database("x".into()).is_remember_me_soft_failure());
    }

    #[test]
    fn test_theft_maps_to_forbidden() {
        let response = AppError::CookieTheftDetected.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
