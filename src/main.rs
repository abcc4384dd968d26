// SPDX-License-Identifier: MIT

//! accounts-api server
//!
//! Authenticates users via Twitter OAuth and keeps them logged in across
//! visits with rotating remember-me tokens.

use accounts_api::{
    config::Config,
    db::MemoryStore,
    services::{OAuthAuthenticator, RememberMeManager, TwitterClient},
    AppState, PendingHandshakes,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting accounts-api");

    // Reference backend; durable engines plug in behind the store traits.
    let store = Arc::new(MemoryStore::new());
    tracing::info!("In-memory store initialized");

    let twitter = Arc::new(TwitterClient::new(
        config.twitter_consumer_key.clone(),
        config.twitter_consumer_secret.clone(),
    ));

    let authenticator = OAuthAuthenticator::new(twitter, store.clone(), store.clone());

    let remember_me = RememberMeManager::new(
        store.clone(),
        store.clone(),
        config.series_length,
        config.token_length,
        config.remember_me_validity_secs,
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        identities: store,
        authenticator,
        remember_me,
        pending: PendingHandshakes::new(),
    });

    // Build router
    let app = accounts_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("accounts_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
