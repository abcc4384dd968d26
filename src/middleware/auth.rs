// SPDX-License-Identifier: MIT

//! Request authentication middleware.
//!
//! Resolves the principal once per request: a valid session JWT wins, then
//! the remember-me cookie is validated (and rotated). Every remember-me
//! failure except theft detection silently degrades to "unauthenticated";
//! protected routes then reject via the [`crate::security::CurrentUser`]
//! extractor.

use crate::config::SESSION_JWT_LIFETIME_SECS;
use crate::error::AppError;
use crate::security::{Authentication, RememberedLogin, ResumedSession};
use crate::services::remember_me;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Short-lived session cookie (JWT).
pub const SESSION_COOKIE: &str = "accounts_session";
/// Long-lived persistent-login cookie.
pub const REMEMBER_ME_COOKIE: &str = "accounts_remember_me";

/// Session JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Attach the request's authentication context, if any credential resolves.
///
/// Never rejects on its own except for cookie theft, which is surfaced
/// distinctly (and clears both cookies) so the user can be warned.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    // Session JWT first: cheap, no rotation side effects.
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(user_id) = decode_session_jwt(cookie.value(), &state.config.jwt_signing_key) {
            match state.identities.get_by_id(user_id).await {
                Ok(Some(user)) => {
                    request.extensions_mut().insert(Authentication::authenticated(
                        Arc::new(ResumedSession::new(user)),
                    ));
                    return next.run(request).await;
                }
                Ok(None) => {
                    tracing::debug!(user_id, "Session JWT for unknown user, ignoring");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Identity lookup failed for session JWT");
                }
            }
        }
    }

    // Fall back to the remember-me cookie.
    let Some(cookie) = jar.get(REMEMBER_ME_COOKIE) else {
        return next.run(request).await;
    };
    let cookie_value = cookie.value().to_string();

    let (user_id, series, token_value) = match remember_me::decode_cookie(&cookie_value) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable remember-me cookie, ignoring");
            return next.run(request).await;
        }
    };

    match state
        .remember_me
        .validate_and_rotate(&user_id, &series, &token_value)
        .await
    {
        Ok((user, refreshed)) => {
            let session_jwt = user
                .id
                .map(|uid| create_session_jwt(uid, &state.config.jwt_signing_key));
            request.extensions_mut().insert(Authentication::authenticated(
                Arc::new(RememberedLogin::new(user, series)),
            ));

            let mut response = next.run(request).await;
            if let Some(Ok(jwt)) = session_jwt {
                append_cookie(&mut response, session_cookie(&jwt, &state));
            }
            if let Some(refreshed) = refreshed {
                let value = remember_me::encode_cookie(&refreshed);
                append_cookie(
                    &mut response,
                    remember_me_cookie(value, state.remember_me.validity_secs(), &state),
                );
            }
            response
        }
        Err(AppError::CookieTheftDetected) => {
            // All persistent sessions are already revoked; clear the cookies
            // and surface the distinct error so the caller can warn the user.
            let mut response = AppError::CookieTheftDetected.into_response();
            append_cookie(&mut response, removal_cookie(SESSION_COOKIE, &state));
            append_cookie(&mut response, removal_cookie(REMEMBER_ME_COOKIE, &state));
            response
        }
        Err(e) if e.is_remember_me_soft_failure() => {
            tracing::debug!(error = %e, "Remember-me validation failed, interactive login required");
            next.run(request).await
        }
        Err(e) => {
            // Store trouble costs the user a password entry, nothing more.
            tracing::warn!(error = %e, "Remember-me validation errored, continuing unauthenticated");
            next.run(request).await
        }
    }
}

/// Create a session JWT for a user.
pub fn create_session_jwt(user_id: u64, signing_key: &[u8]) -> anyhow::Result<String> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + SESSION_JWT_LIFETIME_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Decode and validate a session JWT, returning the user id it names.
pub fn decode_session_jwt(token: &str, signing_key: &[u8]) -> Option<u64> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &key, &validation).ok()?;
    data.claims.sub.parse().ok()
}

// ─── Cookie construction ─────────────────────────────────────────

fn secure_cookies(state: &AppState) -> bool {
    state.config.frontend_url.starts_with("https://")
}

/// Session cookie: HttpOnly, session-scoped (no max-age).
pub fn session_cookie(jwt: &str, state: &AppState) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, jwt.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure_cookies(state))
        .build()
}

/// Remember-me cookie: HttpOnly, max-age equal to the validity window.
pub fn remember_me_cookie(value: String, max_age_secs: i64, state: &AppState) -> Cookie<'static> {
    Cookie::build((REMEMBER_ME_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure_cookies(state))
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Expired cookie with the same attributes, for removal.
pub fn removal_cookie(name: &'static str, state: &AppState) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure_cookies(state))
        .max_age(time::Duration::ZERO)
        .build()
}

/// Append a Set-Cookie header to an outgoing response.
pub fn append_cookie(response: &mut Response, cookie: Cookie<'static>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Could not encode Set-Cookie header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_jwt_round_trip() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let jwt = create_session_jwt(42, key).unwrap();
        assert_eq!(decode_session_jwt(&jwt, key), Some(42));
    }

    #[test]
    fn test_session_jwt_rejects_wrong_key() {
        let jwt = create_session_jwt(42, b"correct_key_with_enough_length!").unwrap();
        assert_eq!(
            decode_session_jwt(&jwt, b"wrong_key_with_enough_length!!!"),
            None
        );
    }

    #[test]
    fn test_session_jwt_rejects_garbage() {
        assert_eq!(decode_session_jwt("not-a-jwt", b"key"), None);
    }
}
