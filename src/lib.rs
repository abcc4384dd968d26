// SPDX-License-Identifier: MIT

//! accounts-api: OAuth delegated login with persistent "remember me"
//! sessions.
//!
//! This crate authenticates users against a third-party OAuth provider
//! (Twitter), maps the provider identity onto a local account, and keeps
//! users logged in across visits with rotating remember-me tokens that
//! detect cookie theft.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

use chrono::{DateTime, Duration, Utc};
use config::Config;
use dashmap::DashMap;
use db::IdentityStore;
use models::RequestToken;
use services::{OAuthAuthenticator, RememberMeManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identities: Arc<dyn IdentityStore>,
    pub authenticator: OAuthAuthenticator,
    pub remember_me: RememberMeManager,
    pub pending: PendingHandshakes,
}

/// How long an abandoned handshake is kept before being swept.
const PENDING_HANDSHAKE_TTL_MINUTES: i64 = 10;

/// One in-flight login attempt, parked between the authorize and callback
/// legs of the handshake.
#[derive(Clone)]
pub struct PendingLogin {
    pub request_token: RequestToken,
    /// Whether the user asked to stay logged in.
    pub remember: bool,
    created_at: DateTime<Utc>,
}

/// Caller-owned storage for pending handshakes, keyed by the request token's
/// public value (which the provider echoes back as `oauth_token` on the
/// callback). Entries are single-use and abandoned ones expire.
#[derive(Default)]
pub struct PendingHandshakes {
    inner: DashMap<String, PendingLogin>,
}

impl PendingHandshakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request token until the callback leg arrives.
    pub fn insert(&self, request_token: RequestToken, remember: bool) {
        // Coarse sweep of abandoned attempts; cheap at login rates.
        let cutoff = Utc::now() - Duration::minutes(PENDING_HANDSHAKE_TTL_MINUTES);
        self.inner.retain(|_, pending| pending.created_at > cutoff);

        self.inner.insert(
            request_token.value.clone(),
            PendingLogin {
                request_token,
                remember,
                created_at: Utc::now(),
            },
        );
    }

    /// Claim the pending login for a callback. Single use: the entry is
    /// removed whether or not the rest of the flow succeeds.
    pub fn take(&self, token_value: &str) -> Option<PendingLogin> {
        self.inner.remove(token_value).map(|(_, pending)| pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_token(value: &str) -> RequestToken {
        RequestToken {
            service: "twitter".to_string(),
            value: value.to_string(),
            secret: "secret".to_string(),
            verifier: None,
            callback_confirmed: Some(true),
        }
    }

    #[test]
    fn test_pending_handshake_is_single_use() {
        let pending = PendingHandshakes::new();
        pending.insert(request_token("abc"), true);

        let first = pending.take("abc").expect("first take");
        assert!(first.remember);
        assert!(pending.take("abc").is_none());
    }

    #[test]
    fn test_unknown_token_value_yields_none() {
        let pending = PendingHandshakes::new();
        assert!(pending.take("missing").is_none());
    }
}
