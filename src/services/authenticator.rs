// SPDX-License-Identifier: MIT

//! OAuth delegated-authentication flow.
//!
//! Drives the handshake against the provider client and reconciles the
//! provider's identity payload with a local account:
//!
//! begin_authorization → (user authorizes at the provider) →
//! complete_authorization → verify_identity.
//!
//! The pending request token between the first two legs lives in
//! caller-provided storage (see [`crate::PendingHandshakes`]); the
//! authenticator itself holds no per-flow state.

use crate::db::{AccessTokenStore, IdentityStore};
use crate::error::AppError;
use crate::models::{AccessToken, RequestToken, User};
use crate::services::twitter::{self, OAuthProviderClient, TwitterProfile};
use std::sync::Arc;

/// Drives the OAuth handshake and account reconciliation.
#[derive(Clone)]
pub struct OAuthAuthenticator {
    provider: Arc<dyn OAuthProviderClient>,
    identities: Arc<dyn IdentityStore>,
    access_tokens: Arc<dyn AccessTokenStore>,
}

impl OAuthAuthenticator {
    pub fn new(
        provider: Arc<dyn OAuthProviderClient>,
        identities: Arc<dyn IdentityStore>,
        access_tokens: Arc<dyn AccessTokenStore>,
    ) -> Self {
        Self {
            provider,
            identities,
            access_tokens,
        }
    }

    /// Obtain a request token for our callback URL and build the provider
    /// authorization URL to redirect the user to.
    pub async fn begin_authorization(
        &self,
        callback_url: &str,
    ) -> Result<(RequestToken, String), AppError> {
        let request_token = self.provider.get_request_token(callback_url).await?;
        let redirect =
            authorization_redirect_url(self.provider.user_authorization_url(), &request_token);

        tracing::debug!(callback_url, "Handshake started, redirecting for authorization");
        Ok((request_token, redirect))
    }

    /// Set the callback verifier on the pending request token and exchange
    /// it for an access token.
    pub async fn complete_authorization(
        &self,
        mut pending: RequestToken,
        verifier: &str,
    ) -> Result<AccessToken, AppError> {
        pending.verifier = Some(verifier.to_string());
        self.provider.get_access_token(&pending).await
    }

    /// Fetch and parse the provider identity, reconcile it with the identity
    /// store, and persist the access token for the resolved user.
    pub async fn verify_identity(&self, access_token: &AccessToken) -> Result<User, AppError> {
        let payload = self.provider.fetch_signed_identity(access_token).await?;
        let profile = twitter::parse_identity(payload)?;

        let user = self.reconcile(&profile).await?;

        // Best-effort: a failure to persist the token never fails an
        // already-verified login; the user just re-authorizes next time.
        let user_id = user.id.ok_or_else(|| {
            AppError::Database("reconciled user has no id".to_string())
        })?;
        if let Err(e) = self.access_tokens.put(user_id, access_token).await {
            tracing::warn!(error = %e, user_id, "Failed to store access token, continuing");
        }

        Ok(user)
    }

    /// Map the provider identity onto a local account.
    ///
    /// Unseen twitter id: create (the store assigns the id); if a concurrent
    /// login won the create race, re-read and fall through to the update
    /// path. Known twitter id: copy the payload fields in and write back
    /// only if the profile content actually changed, so an idempotent
    /// re-login performs no store write.
    async fn reconcile(&self, profile: &TwitterProfile) -> Result<User, AppError> {
        let existing = self.identities.get_by_twitter_id(profile.id).await?;

        let existing = match existing {
            None => {
                let mut user = User::for_twitter_id(profile.id);
                apply_profile(&mut user, profile);
                match self.identities.create(&user).await {
                    Ok(created) => {
                        tracing::info!(twitter_id = profile.id, "Created new user");
                        return Ok(created);
                    }
                    Err(AppError::AlreadyExists(_)) => {
                        // Concurrent first login for the same identity; the
                        // other flow's create won.
                        tracing::debug!(
                            twitter_id = profile.id,
                            "Lost create race, taking update path"
                        );
                        self.identities
                            .get_by_twitter_id(profile.id)
                            .await?
                            .ok_or_else(|| {
                                AppError::Database(format!(
                                    "user for twitter id {} vanished after create race",
                                    profile.id
                                ))
                            })?
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(user) => user,
        };

        let mut user = existing;
        let before = user.profile_fields();
        apply_profile(&mut user, profile);

        if user.profile_fields() != before {
            tracing::debug!(twitter_id = profile.id, "Profile changed, updating user");
            self.identities.update(&user).await?;
        } else {
            tracing::trace!(twitter_id = profile.id, "Profile unchanged, no update required");
        }

        Ok(user)
    }
}

/// Copy the payload fields onto the account record.
fn apply_profile(user: &mut User, profile: &TwitterProfile) {
    user.username = profile.screen_name.clone();
    user.name = profile.name.clone();
    user.bio = profile.description.clone();
    user.website = profile.url.clone();
    user.location = profile.location.clone();
    user.followers = profile.followers_count;
    user.friends = profile.friends_count;
    user.time_zone_id = profile.time_zone.clone();
}

/// Append the request token to the provider's authorization URL, preserving
/// any query string the base URL already carries.
fn authorization_redirect_url(base_url: &str, request_token: &RequestToken) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}oauth_token={}",
        base_url,
        separator,
        urlencoding::encode(&request_token.value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> RequestToken {
        RequestToken {
            service: "twitter".to_string(),
            value: value.to_string(),
            secret: "secret".to_string(),
            verifier: None,
            callback_confirmed: Some(true),
        }
    }

    #[test]
    fn test_redirect_url_plain_base() {
        let url =
            authorization_redirect_url("https://api.twitter.com/oauth/authorize", &token("abc"));
        assert_eq!(
            url,
            "https://api.twitter.com/oauth/authorize?oauth_token=abc"
        );
    }

    #[test]
    fn test_redirect_url_preserves_existing_query() {
        let url = authorization_redirect_url(
            "https://api.twitter.com/oauth/authorize?force_login=true",
            &token("abc"),
        );
        assert_eq!(
            url,
            "https://api.twitter.com/oauth/authorize?force_login=true&oauth_token=abc"
        );
    }

    #[test]
    fn test_redirect_url_encodes_token_value() {
        let url =
            authorization_redirect_url("https://api.twitter.com/oauth/authorize", &token("a b+c"));
        assert!(url.ends_with("oauth_token=a%20b%2Bc"));
    }
}
