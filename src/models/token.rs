// SPDX-License-Identifier: MIT

//! OAuth and persistent-login token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol-specific credential material, tagged by protocol version.
///
/// One store method switches on the tag; there is no subclass hierarchy and
/// no runtime downcasting anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenKind {
    /// OAuth 1.0a: the token secret signs every resource request.
    OAuth1 { secret: String },
    /// OAuth 2.0: bearer token with optional refresh material.
    OAuth2 {
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
}

/// A not-yet-authorized OAuth credential, held between the authorize and
/// callback legs of the handshake and discarded after the exchange.
#[derive(Debug, Clone)]
pub struct RequestToken {
    /// Identifier of the provider service this token belongs to.
    pub service: String,
    pub value: String,
    pub secret: String,
    /// Verifier delivered on the callback leg, absent until then.
    pub verifier: Option<String>,
    /// Whether the provider confirmed our callback URL.
    pub callback_confirmed: Option<bool>,
}

/// An authorized OAuth credential for acting on a user's behalf.
///
/// At most one current AccessToken exists per (user, service) pair; storing
/// a new one overwrites the previous one for that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Identifier of the provider service this token belongs to.
    pub service: String,
    pub value: String,
    #[serde(flatten)]
    pub kind: TokenKind,
}

impl AccessToken {
    /// The signing secret, for protocol versions that have one.
    pub fn secret(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::OAuth1 { secret } => Some(secret),
            TokenKind::OAuth2 { .. } => None,
        }
    }
}

/// One remember-me relationship (one browser/device) for a user.
///
/// The series stays stable for the life of the relationship; the value is a
/// single-use secret that rotates on every successful cookie login. A stale
/// value being presented is the theft signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RememberMeToken {
    pub series: String,
    pub user_id: u64,
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

impl RememberMeToken {
    pub fn new(series: String, user_id: u64, value: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            series,
            user_id,
            value,
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_secret_by_kind() {
        let oauth1 = AccessToken {
            service: "twitter".to_string(),
            value: "v".to_string(),
            kind: TokenKind::OAuth1 {
                secret: "s".to_string(),
            },
        };
        assert_eq!(oauth1.secret(), Some("s"));

        let oauth2 = AccessToken {
            service: "example".to_string(),
            value: "v".to_string(),
            kind: TokenKind::OAuth2 {
                refresh_token: None,
                expires_at: None,
            },
        };
        assert_eq!(oauth2.secret(), None);
    }
}
