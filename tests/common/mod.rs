// SPDX-License-Identifier: MIT

use accounts_api::config::Config;
use accounts_api::db::MemoryStore;
use accounts_api::error::AppError;
use accounts_api::models::{AccessToken, RequestToken, TokenKind};
use accounts_api::routes::create_router;
use accounts_api::services::{OAuthAuthenticator, OAuthProviderClient, RememberMeManager};
use accounts_api::{AppState, PendingHandshakes};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted provider client: hands out deterministic tokens and a settable
/// identity payload, no network involved.
pub struct MockProvider {
    payload: Mutex<serde_json::Value>,
    counter: AtomicU64,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload: Mutex::new(payload),
            counter: AtomicU64::new(0),
        }
    }

    pub fn set_payload(&self, payload: serde_json::Value) {
        *self.payload.lock().unwrap() = payload;
    }
}

#[async_trait]
impl OAuthProviderClient for MockProvider {
    async fn get_request_token(&self, _callback_url: &str) -> Result<RequestToken, AppError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RequestToken {
            service: "twitter".to_string(),
            value: format!("req-{n}"),
            secret: format!("req-secret-{n}"),
            verifier: None,
            callback_confirmed: Some(true),
        })
    }

    async fn get_access_token(
        &self,
        request_token: &RequestToken,
    ) -> Result<AccessToken, AppError> {
        if request_token.verifier.is_none() {
            return Err(AppError::ProviderRejected("no verifier".to_string()));
        }
        Ok(AccessToken {
            service: "twitter".to_string(),
            value: format!("access-for-{}", request_token.value),
            kind: TokenKind::OAuth1 {
                secret: "access-secret".to_string(),
            },
        })
    }

    async fn fetch_signed_identity(
        &self,
        _access_token: &AccessToken,
    ) -> Result<serde_json::Value, AppError> {
        Ok(self.payload.lock().unwrap().clone())
    }

    fn user_authorization_url(&self) -> &str {
        "https://provider.test/authorize"
    }
}

/// A plausible verify_credentials payload.
#[allow(dead_code)]
pub fn sample_payload() -> serde_json::Value {
    serde_json::json!({
        "id": 42,
        "name": "Ann",
        "screen_name": "ann",
        "location": "London",
        "description": "hello",
        "url": "https://ann.example",
        "time_zone": "Europe/London",
        "followers_count": 10,
        "friends_count": 5,
    })
}

/// Create a test app over the in-memory store and a scripted provider.
#[allow(dead_code)]
pub fn create_test_app(
    payload: serde_json::Value,
) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>, Arc<MockProvider>) {
    let config = Config::test_default();
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(MockProvider::new(payload));

    let authenticator =
        OAuthAuthenticator::new(provider.clone(), store.clone(), store.clone());
    let remember_me = RememberMeManager::new(
        store.clone(),
        store.clone(),
        config.series_length,
        config.token_length,
        config.remember_me_validity_secs,
    );

    let state = Arc::new(AppState {
        config,
        identities: store.clone(),
        authenticator,
        remember_me,
        pending: PendingHandshakes::new(),
    });

    (create_router(state.clone()), state, store, provider)
}
