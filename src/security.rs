// SPDX-License-Identifier: MIT

//! Request-scoped security context.
//!
//! The authenticated principal is carried as an explicit request extension,
//! inserted by the authentication middleware and read here. There is no
//! ambient thread-bound state: anything that needs the current user takes it
//! from the request it is handling.

use crate::error::AppError;
use crate::models::{AccessToken, User};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// How the current request proved who it is.
#[derive(Debug, Clone)]
pub enum ProviderCredential {
    /// Fresh OAuth handshake with the provider.
    OAuth(AccessToken),
    /// Validated remember-me cookie; the series identifies the device.
    RememberMe { series: String },
    /// Resumed short-lived session.
    Session,
}

/// Capability carried by every kind of login: a principal plus the
/// credential that produced it. One implementation per login path, no
/// inheritance hierarchy.
pub trait AuthSession: Send + Sync {
    fn principal(&self) -> &User;
    fn credentials(&self) -> &ProviderCredential;
}

/// Login established by the OAuth handshake.
pub struct OAuthLogin {
    user: User,
    credential: ProviderCredential,
}

impl OAuthLogin {
    pub fn new(user: User, token: AccessToken) -> Self {
        Self {
            user,
            credential: ProviderCredential::OAuth(token),
        }
    }
}

impl AuthSession for OAuthLogin {
    fn principal(&self) -> &User {
        &self.user
    }
    fn credentials(&self) -> &ProviderCredential {
        &self.credential
    }
}

/// Login established by a validated remember-me cookie.
pub struct RememberedLogin {
    user: User,
    credential: ProviderCredential,
}

impl RememberedLogin {
    pub fn new(user: User, series: String) -> Self {
        Self {
            user,
            credential: ProviderCredential::RememberMe { series },
        }
    }
}

impl AuthSession for RememberedLogin {
    fn principal(&self) -> &User {
        &self.user
    }
    fn credentials(&self) -> &ProviderCredential {
        &self.credential
    }
}

/// Login resumed from a session token issued earlier in the same visit.
pub struct ResumedSession {
    user: User,
    credential: ProviderCredential,
}

impl ResumedSession {
    pub fn new(user: User) -> Self {
        Self {
            user,
            credential: ProviderCredential::Session,
        }
    }
}

impl AuthSession for ResumedSession {
    fn principal(&self) -> &User {
        &self.user
    }
    fn credentials(&self) -> &ProviderCredential {
        &self.credential
    }
}

/// The authentication attached to one request.
#[derive(Clone)]
pub struct Authentication {
    session: Arc<dyn AuthSession>,
    authenticated: bool,
}

impl Authentication {
    pub fn authenticated(session: Arc<dyn AuthSession>) -> Self {
        Self {
            session,
            authenticated: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn principal(&self) -> Option<&User> {
        if self.authenticated {
            Some(self.session.principal())
        } else {
            None
        }
    }

    pub fn credentials(&self) -> &ProviderCredential {
        self.session.credentials()
    }
}

/// The user authenticated for the current request, if any.
///
/// None when no authentication is attached, when the attached value is of a
/// foreign type, or when it is not in an authenticated state. Pure read: no
/// store access, no side effects.
pub fn current_user(extensions: &axum::http::Extensions) -> Option<&User> {
    extensions
        .get::<Authentication>()
        .and_then(|auth| auth.principal())
}

/// Extractor: the authenticated user, rejecting with 401 when absent.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions)
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor: the authenticated user, or None without rejecting.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(current_user(&parts.extensions).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let mut user = User::for_twitter_id(42);
        user.id = Some(7);
        user.username = "ann".to_string();
        user
    }

    #[test]
    fn test_no_authentication_attached() {
        let extensions = axum::http::Extensions::new();
        assert!(current_user(&extensions).is_none());
    }

    #[test]
    fn test_foreign_extension_type_is_ignored() {
        let mut extensions = axum::http::Extensions::new();
        extensions.insert("not an authentication".to_string());
        assert!(current_user(&extensions).is_none());
    }

    #[test]
    fn test_authenticated_session_yields_principal() {
        let mut extensions = axum::http::Extensions::new();
        let auth = Authentication::authenticated(Arc::new(ResumedSession::new(sample_user())));
        extensions.insert(auth);

        let user = current_user(&extensions).expect("principal");
        assert_eq!(user.id, Some(7));
    }

    #[test]
    fn test_unauthenticated_session_yields_none() {
        let mut extensions = axum::http::Extensions::new();
        let auth = Authentication {
            session: Arc::new(ResumedSession::new(sample_user())),
            authenticated: false,
        };
        extensions.insert(auth);

        assert!(current_user(&extensions).is_none());
    }

    #[test]
    fn test_remembered_login_carries_series() {
        let login = RememberedLogin::new(sample_user(), "series-1".to_string());
        match login.credentials() {
            ProviderCredential::RememberMe { series } => assert_eq!(series, "series-1"),
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[test]
    fn test_oauth_login_carries_access_token() {
        use crate::models::{AccessToken, TokenKind};

        let token = AccessToken {
            service: "twitter".to_string(),
            value: "v".to_string(),
            kind: TokenKind::OAuth1 {
                secret: "s".to_string(),
            },
        };
        let login = OAuthLogin::new(sample_user(), token);
        match login.credentials() {
            ProviderCredential::OAuth(token) => assert_eq!(token.value, "v"),
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_maybe_user_extractor_never_rejects() {
        use axum::extract::FromRequestParts;

        let request = axum::http::Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
