// SPDX-License-Identifier: MIT

//! Twitter OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::{
    self, create_session_jwt, remember_me_cookie, removal_cookie, session_cookie,
};
use crate::security::{AuthSession, CurrentUser, MaybeUser, OAuthLogin};
use crate::services::remember_me::encode_cookie;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/twitter", get(auth_start))
        .route("/auth/twitter/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
        .route("/auth/logout/all", post(logout_all))
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Stay logged in across visits.
    #[serde(default)]
    remember: bool,
}

/// Start the handshake: obtain a request token, park it, and redirect the
/// user to the provider's authorization page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let callback_url = callback_url(&headers);

    let (request_token, redirect) = state
        .authenticator
        .begin_authorization(&callback_url)
        .await?;

    state.pending.insert(request_token, params.remember);

    tracing::info!(
        callback_url = %callback_url,
        remember = params.remember,
        "Starting OAuth flow, redirecting to Twitter"
    );

    Ok(Redirect::temporary(&redirect))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    oauth_token: Option<String>,
    #[serde(default)]
    oauth_verifier: Option<String>,
    /// Set by Twitter when the user declined authorization.
    #[serde(default)]
    denied: Option<String>,
}

/// Callback leg: exchange the verified request token, resolve the identity,
/// and establish the session (plus a persistent login when requested).
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let frontend = state.config.frontend_url.clone();

    if params.denied.is_some() {
        tracing::info!("User declined authorization at the provider");
        return error_redirect(&frontend, "denied");
    }

    let (Some(oauth_token), Some(verifier)) = (params.oauth_token, params.oauth_verifier) else {
        tracing::warn!("Callback missing oauth_token or oauth_verifier");
        return error_redirect(&frontend, "invalid_callback");
    };

    // A missing entry means the handshake expired, was already used, or
    // never started here. The flow must restart from the beginning.
    let Some(pending) = state.pending.take(&oauth_token) else {
        tracing::warn!("No pending handshake for presented oauth_token");
        return error_redirect(&frontend, "login_expired");
    };

    let access_token = match state
        .authenticator
        .complete_authorization(pending.request_token, &verifier)
        .await
    {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "Access token exchange failed");
            return error_redirect(&frontend, "exchange_failed");
        }
    };

    let user = match state.authenticator.verify_identity(&access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Identity verification failed");
            return error_redirect(&frontend, "verification_failed");
        }
    };

    // The handshake produced a full login session; everything below reads
    // the principal from it, the same way resumed requests read theirs from
    // the middleware-attached session.
    let login = OAuthLogin::new(user, access_token);
    let user = login.principal();

    tracing::info!(
        user_id = user.id,
        username = %user.username,
        "OAuth login successful"
    );

    let mut jar = CookieJar::new();
    if let Some(user_id) = user.id {
        match create_session_jwt(user_id, &state.config.jwt_signing_key) {
            Ok(jwt) => jar = jar.add(session_cookie(&jwt, &state)),
            Err(e) => tracing::error!(error = %e, "Session JWT creation failed"),
        }
    }

    if pending.remember {
        // A failure here is a minor inconvenience, never a failed login.
        match state.remember_me.issue_on_login(user).await {
            Ok(token) => {
                jar = jar.add(remember_me_cookie(
                    encode_cookie(&token),
                    state.remember_me.validity_secs(),
                    &state,
                ));
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not issue persistent login; user logs in interactively next time"
                );
            }
        }
    }

    (jar, Redirect::temporary(&frontend)).into_response()
}

/// Log out of this browser: clear cookies. Other devices' persistent logins
/// stay valid.
async fn logout(State(state): State<Arc<AppState>>, MaybeUser(user): MaybeUser) -> Response {
    if let Some(user) = user {
        tracing::info!(user_id = user.id, "User logged out");
    }
    let jar = CookieJar::new()
        .add(removal_cookie(auth::SESSION_COOKIE, &state))
        .add(removal_cookie(auth::REMEMBER_ME_COOKIE, &state));
    (jar, StatusCode::NO_CONTENT).into_response()
}

/// Log out everywhere: revoke every persistent login for the user, then
/// clear this browser's cookies.
async fn logout_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response> {
    if let Some(user_id) = user.id {
        state.remember_me.logout(user_id).await?;
        tracing::info!(user_id, "Revoked all persistent logins");
    }
    let jar = CookieJar::new()
        .add(removal_cookie(auth::SESSION_COOKIE, &state))
        .add(removal_cookie(auth::REMEMBER_ME_COOKIE, &state));
    Ok((jar, StatusCode::NO_CONTENT).into_response())
}

/// Callback URL for the current request, from the Host header.
fn callback_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/twitter/callback", scheme, host)
}

/// Send the user back to the frontend with an error code it can display.
fn error_redirect(frontend_url: &str, code: &str) -> Response {
    let url = format!("{}?error={}", frontend_url, urlencoding::encode(code));
    Redirect::temporary(&url).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    #[test]
    fn test_callback_url_localhost_is_http() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        assert_eq!(
            callback_url(&headers),
            "http://localhost:8080/auth/twitter/callback"
        );
    }

    #[test]
    fn test_callback_url_production_is_https() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::HOST,
            HeaderValue::from_static("accounts.example.com"),
        );
        assert_eq!(
            callback_url(&headers),
            "https://accounts.example.com/auth/twitter/callback"
        );
    }
}
