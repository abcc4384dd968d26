// SPDX-License-Identifier: MIT

//! Persistent-login ("remember me") token protocol.
//!
//! Each remember-me relationship is a series with a single-use rotating
//! secret. A valid presentation rotates the secret in place; presenting an
//! already-rotated value is treated as evidence the cookie was copied, and
//! every persistent session for that user is revoked.
//!
//! Storage failures while issuing or rotating are deliberately downgraded:
//! losing a remember-me cookie costs the user one password entry, so it must
//! never fail an otherwise-successful login.

use crate::db::{IdentityStore, TokenSeriesStore};
use crate::error::AppError;
use crate::models::{RememberMeToken, User};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Issues, validates, rotates and revokes remember-me tokens.
#[derive(Clone)]
pub struct RememberMeManager {
    tokens: Arc<dyn TokenSeriesStore>,
    identities: Arc<dyn IdentityStore>,
    series_length: usize,
    token_length: usize,
    validity: Duration,
    rng: SystemRandom,
}

impl RememberMeManager {
    pub fn new(
        tokens: Arc<dyn TokenSeriesStore>,
        identities: Arc<dyn IdentityStore>,
        series_length: usize,
        token_length: usize,
        validity_secs: i64,
    ) -> Self {
        Self {
            tokens,
            identities,
            series_length,
            token_length,
            validity: Duration::seconds(validity_secs),
            rng: SystemRandom::new(),
        }
    }

    /// Seconds a token stays valid; also the cookie max-age.
    pub fn validity_secs(&self) -> i64 {
        self.validity.num_seconds()
    }

    /// Create a new persistent login for the user: fresh random series
    /// (retried until unused for this user) and fresh random value.
    pub async fn issue_on_login(&self, user: &User) -> Result<RememberMeToken, AppError> {
        let user_id = user
            .id
            .ok_or_else(|| AppError::Database("cannot issue token for unsaved user".to_string()))?;

        loop {
            let series = self.generate(self.series_length)?;
            if self.tokens.get(&series, user_id).await?.is_some() {
                tracing::trace!(user_id, "Series already in use, generating a new one");
                continue;
            }

            let token = RememberMeToken::new(
                series,
                user_id,
                self.generate(self.token_length)?,
                Utc::now(),
            );
            match self.tokens.create(&token).await {
                Ok(()) => {
                    tracing::debug!(user_id, series = %token.series, "Issued persistent login");
                    return Ok(token);
                }
                // Lost the check-then-create race; negligible odds, retry
                // with a fresh series.
                Err(AppError::AlreadyExists(_)) => {
                    tracing::trace!(user_id, "Series created concurrently, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode a cookie and run the full validation/rotation protocol.
    ///
    /// A malformed cookie is rejected before any store access.
    pub async fn validate_cookie(
        &self,
        cookie_value: &str,
    ) -> Result<(User, Option<RememberMeToken>), AppError> {
        let (user_id, series, token) = decode_cookie(cookie_value)?;
        self.validate_and_rotate(&user_id, &series, &token).await
    }

    /// Validate a presented (user, series, value) triple and rotate the
    /// stored value on success.
    ///
    /// Returns the authenticated user and, unless the rotation write failed,
    /// the refreshed token for re-issuing the cookie.
    pub async fn validate_and_rotate(
        &self,
        presented_user_id: &str,
        presented_series: &str,
        presented_token: &str,
    ) -> Result<(User, Option<RememberMeToken>), AppError> {
        let user_id: u64 = presented_user_id
            .parse()
            .map_err(|_| AppError::UnknownPrincipal)?;

        let user = self
            .identities
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::UnknownPrincipal)?;

        let stored = self
            .tokens
            .get(presented_series, user_id)
            .await?
            .ok_or(AppError::NoSuchSeries)?;

        // A mismatch means an already-rotated value was presented: either
        // the cookie was copied before the legitimate rotation, or two
        // requests raced on the same stale cookie. Both get the full theft
        // response; the revoke must be durable before we report it.
        if !constant_time_eq(presented_token, &stored.value) {
            tracing::warn!(
                user_id,
                series = presented_series,
                "Presented token does not match stored value; revoking all persistent logins"
            );
            self.tokens.delete_all_for_user(user_id).await?;
            return Err(AppError::CookieTheftDetected);
        }

        // Inclusive boundary: a token presented exactly at the end of its
        // window is already expired.
        if Utc::now() >= stored.issued_at + self.validity {
            tracing::debug!(user_id, series = presented_series, "Persistent login expired");
            return Err(AppError::TokenExpired);
        }

        // Rotate the value, keeping the same series.
        let refreshed = RememberMeToken::new(
            stored.series.clone(),
            user_id,
            self.generate(self.token_length)?,
            Utc::now(),
        );
        match self.tokens.update(&refreshed).await {
            Ok(()) => {
                tracing::debug!(user_id, series = %refreshed.series, "Rotated persistent login");
                Ok((user, Some(refreshed)))
            }
            Err(e) => {
                // Worst case the user enters their password next time.
                tracing::warn!(
                    error = %e,
                    user_id,
                    "Failed to persist rotated token; cookie will not be refreshed"
                );
                Ok((user, None))
            }
        }
    }

    /// Revoke every persistent login for the user. Same cleanup as the theft
    /// response, without the alarm.
    pub async fn logout(&self, user_id: u64) -> Result<(), AppError> {
        tracing::debug!(user_id, "Removing all persistent logins");
        self.tokens.delete_all_for_user(user_id).await
    }

    fn generate(&self, length: usize) -> Result<String, AppError> {
        let mut bytes = vec![0u8; length];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("random generation failed")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Cookie value for a token: three base64url fields, dot-joined:
/// `user_id . series . value`.
pub fn encode_cookie(token: &RememberMeToken) -> String {
    [
        token.user_id.to_string().as_str(),
        token.series.as_str(),
        token.value.as_str(),
    ]
    .map(|field| URL_SAFE_NO_PAD.encode(field.as_bytes()))
    .join(".")
}

/// Split a cookie back into its (user_id, series, value) fields.
///
/// Anything other than exactly three decodable fields is malformed.
pub fn decode_cookie(value: &str) -> Result<(String, String, String), AppError> {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != 3 {
        return Err(AppError::MalformedCookie);
    }
    let mut decoded = Vec::with_capacity(3);
    for part in parts {
        let bytes = URL_SAFE_NO_PAD
            .decode(part)
            .map_err(|_| AppError::MalformedCookie)?;
        decoded.push(String::from_utf8(bytes).map_err(|_| AppError::MalformedCookie)?);
    }
    Ok((
        decoded[0].clone(),
        decoded[1].clone(),
        decoded[2].clone(),
    ))
}
