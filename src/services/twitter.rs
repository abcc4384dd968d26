// SPDX-License-Identifier: MIT

//! Twitter OAuth 1.0a provider client.
//!
//! Implements the three wire operations the authenticator needs:
//! - obtain a request token (with our callback URL)
//! - exchange a verified request token for an access token
//! - fetch the signed "who am I" resource (verify_credentials)
//!
//! All three requests carry an RFC 5849 `Authorization: OAuth ...` header
//! signed with HMAC-SHA1.

use crate::error::AppError;
use crate::models::{AccessToken, RequestToken, TokenKind};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;

/// Service identifier stored with tokens issued by this client.
pub const SERVICE_ID: &str = "twitter";

const REQUEST_TOKEN_URL: &str = "https://api.twitter.com/oauth/request_token";
const ACCESS_TOKEN_URL: &str = "https://api.twitter.com/oauth/access_token";
const AUTHORIZE_URL: &str = "https://api.twitter.com/oauth/authorize";
const VERIFY_CREDENTIALS_URL: &str =
    "https://api.twitter.com/1.1/account/verify_credentials.json";

/// The wire operations of the delegated-authentication handshake.
///
/// The authenticator only talks to the provider through this trait, so tests
/// substitute a scripted implementation.
#[async_trait]
pub trait OAuthProviderClient: Send + Sync {
    /// Obtain a request token bound to our callback URL.
    async fn get_request_token(&self, callback_url: &str) -> Result<RequestToken, AppError>;

    /// Exchange a request token (with verifier set) for an access token.
    async fn get_access_token(&self, request_token: &RequestToken)
        -> Result<AccessToken, AppError>;

    /// Fetch the provider's identity resource, signed with the access token.
    async fn fetch_signed_identity(
        &self,
        access_token: &AccessToken,
    ) -> Result<serde_json::Value, AppError>;

    /// Base URL the user is redirected to for authorizing the request token.
    fn user_authorization_url(&self) -> &str;
}

/// Twitter API client with OAuth 1.0a request signing.
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    request_token_url: String,
    access_token_url: String,
    authorize_url: String,
    verify_credentials_url: String,
    rng: SystemRandom,
}

impl TwitterClient {
    /// Create a new Twitter client with OAuth consumer credentials.
    pub fn new(consumer_key: String, consumer_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            consumer_key,
            consumer_secret,
            request_token_url: REQUEST_TOKEN_URL.to_string(),
            access_token_url: ACCESS_TOKEN_URL.to_string(),
            authorize_url: AUTHORIZE_URL.to_string(),
            verify_credentials_url: VERIFY_CREDENTIALS_URL.to_string(),
            rng: SystemRandom::new(),
        }
    }

    /// Build the signed Authorization header for one request.
    ///
    /// `extra` holds protocol parameters beyond the standard set
    /// (oauth_callback, oauth_verifier); `token` is the request or access
    /// token being used, if any.
    fn authorization_header(
        &self,
        method: &str,
        url: &str,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
    ) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; 16];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("nonce generation failed")))?;
        let nonce = hex::encode(nonce_bytes);
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some((value, _)) = token {
            params.push(("oauth_token".to_string(), value.to_string()));
        }
        for (k, v) in extra {
            params.push((k.to_string(), v.to_string()));
        }

        let base = signature_base_string(method, url, &params);
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(token.map(|(_, secret)| secret).unwrap_or(""))
        );
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
        let signature = STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref());
        params.push(("oauth_signature".to_string(), signature));

        let header = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }
}

#[async_trait]
impl OAuthProviderClient for TwitterClient {
    async fn get_request_token(&self, callback_url: &str) -> Result<RequestToken, AppError> {
        let auth = self.authorization_header(
            "POST",
            &self.request_token_url,
            None,
            &[("oauth_callback", callback_url)],
        )?;

        let response = self
            .http
            .post(&self.request_token_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable(e.to_string()))?;

        let body = check_text_response(response, "request token").await?;
        let fields = parse_form_body(&body);

        let value = require_field(&fields, "oauth_token", "request token")?;
        let secret = require_field(&fields, "oauth_token_secret", "request token")?;
        let callback_confirmed = fields
            .iter()
            .find(|(k, _)| k == "oauth_callback_confirmed")
            .map(|(_, v)| v == "true");

        tracing::debug!(callback_url, "Obtained request token");

        Ok(RequestToken {
            service: SERVICE_ID.to_string(),
            value,
            secret,
            verifier: None,
            callback_confirmed,
        })
    }

    async fn get_access_token(
        &self,
        request_token: &RequestToken,
    ) -> Result<AccessToken, AppError> {
        let verifier = request_token.verifier.as_deref().ok_or_else(|| {
            AppError::ProviderRejected("request token has no verifier".to_string())
        })?;

        let auth = self.authorization_header(
            "POST",
            &self.access_token_url,
            Some((&request_token.value, &request_token.secret)),
            &[("oauth_verifier", verifier)],
        )?;

        let response = self
            .http
            .post(&self.access_token_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Access token exchange rejected");
            return Err(AppError::ProviderRejected(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ProviderUnavailable(e.to_string()))?;
        let fields = parse_form_body(&body);

        let value = require_field(&fields, "oauth_token", "access token")?;
        let secret = require_field(&fields, "oauth_token_secret", "access token")?;

        tracing::debug!("Exchanged request token for access token");

        Ok(AccessToken {
            service: SERVICE_ID.to_string(),
            value,
            kind: TokenKind::OAuth1 { secret },
        })
    }

    async fn fetch_signed_identity(
        &self,
        access_token: &AccessToken,
    ) -> Result<serde_json::Value, AppError> {
        let secret = access_token.secret().ok_or_else(|| {
            AppError::ProviderRejected("access token carries no signing secret".to_string())
        })?;

        let auth = self.authorization_header(
            "GET",
            &self.verify_credentials_url,
            Some((&access_token.value, secret)),
            &[],
        )?;

        let response = self
            .http
            .get(&self.verify_credentials_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AppError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderRejected(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalformedIdentityPayload(format!("JSON parse error: {}", e)))
    }

    fn user_authorization_url(&self) -> &str {
        &self.authorize_url
    }
}

/// Identity payload returned by verify_credentials, reduced to the fields
/// the account record carries.
///
/// `id`, `name`, `screen_name` and the counts are required; the rest are
/// nullable on the wire. A missing or ill-typed required field fails the
/// whole parse.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterProfile {
    pub id: u64,
    pub name: String,
    pub screen_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    pub followers_count: u32,
    pub friends_count: u32,
}

/// Parse the raw identity payload into a profile.
pub fn parse_identity(payload: serde_json::Value) -> Result<TwitterProfile, AppError> {
    serde_json::from_value(payload).map_err(|e| AppError::MalformedIdentityPayload(e.to_string()))
}

/// RFC 5849 percent-encoding: everything except unreserved characters is
/// encoded, with uppercase hex digits. Stricter than form encoding, which is
/// why this is not `urlencoding::encode`.
pub(crate) fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Build the OAuth signature base string: METHOD & enc(url) & enc(sorted params).
fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// Parse a form-encoded token response body into key/value pairs.
fn parse_form_body(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

fn require_field(
    fields: &[(String, String)],
    name: &str,
    context: &str,
) -> Result<String, AppError> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| {
            AppError::ProviderRejected(format!("{} response missing {}", context, name))
        })
}

async fn check_text_response(
    response: reqwest::Response,
    context: &str,
) -> Result<String, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ProviderUnavailable(format!(
            "{} request failed with HTTP {}: {}",
            context, status, body
        )));
    }
    response
        .text()
        .await
        .map_err(|e| AppError::ProviderUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_encode_unreserved_untouched() {
        assert_eq!(percent_encode("AZaz09-._~"), "AZaz09-._~");
    }

    #[test]
    fn test_percent_encode_reserved_uppercase_hex() {
        assert_eq!(percent_encode("a b/c?"), "a%20b%2Fc%3F");
        assert_eq!(
            percent_encode("http://example.com/cb"),
            "http%3A%2F%2Fexample.com%2Fcb"
        );
    }

    #[test]
    fn test_signature_base_string_sorts_params() {
        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let base = signature_base_string("post", "http://example.com/x", &params);
        assert!(base.starts_with("POST&http%3A%2F%2Fexample.com%2Fx&"));
        assert!(base.ends_with(&percent_encode("a=1&b=2")));
    }

    #[test]
    fn test_parse_form_body() {
        let fields = parse_form_body("oauth_token=abc&oauth_token_secret=def&x=1");
        assert_eq!(
            require_field(&fields, "oauth_token", "test").unwrap(),
            "abc"
        );
        assert_eq!(
            require_field(&fields, "oauth_token_secret", "test").unwrap(),
            "def"
        );
        assert!(require_field(&fields, "missing", "test").is_err());
    }

    #[test]
    fn test_parse_identity_complete_payload() {
        let profile = parse_identity(json!({
            "id": 42,
            "name": "Ann",
            "screen_name": "ann",
            "location": "London",
            "description": "hello",
            "url": "https://ann.example",
            "time_zone": "Europe/London",
            "followers_count": 10,
            "friends_count": 5,
        }))
        .unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.screen_name, "ann");
        assert_eq!(profile.followers_count, 10);
    }

    #[test]
    fn test_parse_identity_missing_required_field() {
        let err = parse_identity(json!({
            "name": "Ann",
            "screen_name": "ann",
            "followers_count": 10,
            "friends_count": 5,
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedIdentityPayload(_)));
    }

    #[test]
    fn test_parse_identity_wrong_type() {
        let err = parse_identity(json!({
            "id": "not-a-number",
            "name": "Ann",
            "screen_name": "ann",
            "followers_count": 10,
            "friends_count": 5,
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedIdentityPayload(_)));
    }

    #[test]
    fn test_parse_identity_nullable_fields_may_be_null() {
        let profile = parse_identity(json!({
            "id": 42,
            "name": "Ann",
            "screen_name": "ann",
            "location": null,
            "url": null,
            "time_zone": null,
            "followers_count": 0,
            "friends_count": 0,
        }))
        .unwrap();
        assert!(profile.location.is_none());
        assert!(profile.time_zone.is_none());
    }
}
