// SPDX-License-Identifier: MIT

//! Storage layer: the collaborator contracts the authentication core
//! consumes, plus the in-memory reference backend.
//!
//! Backends are interchangeable behind these traits; the core never sees
//! row layout or engine details.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{AccessToken, RememberMeToken, User};
use async_trait::async_trait;

/// Durable storage of identity records.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new user and assign its id. Fails with
    /// [`AppError::AlreadyExists`] if a user with the same twitter id was
    /// created concurrently; callers re-read and take the update path.
    async fn create(&self, user: &User) -> Result<User, AppError>;

    /// Get a user by store-assigned id.
    async fn get_by_id(&self, id: u64) -> Result<Option<User>, AppError>;

    /// Get a user by external twitter id.
    async fn get_by_twitter_id(&self, twitter_id: u64) -> Result<Option<User>, AppError>;

    /// Update an existing user in place.
    async fn update(&self, user: &User) -> Result<(), AppError>;
}

/// Durable storage of OAuth access tokens, keyed by (user, service) with
/// overwrite semantics.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    async fn get(&self, user_id: u64, service: &str) -> Result<Option<AccessToken>, AppError>;

    /// Store a token for the user, replacing any previous token for the same
    /// (user, service) pair.
    async fn put(&self, user_id: u64, token: &AccessToken) -> Result<(), AppError>;
}

/// Durable storage of remember-me tokens, keyed by (series, user).
#[async_trait]
pub trait TokenSeriesStore: Send + Sync {
    /// Store a new token. Fails with [`AppError::AlreadyExists`] if the
    /// (series, user) key is already taken; the issuer retries with a fresh
    /// series.
    async fn create(&self, token: &RememberMeToken) -> Result<(), AppError>;

    /// Get the current token for a (series, user), if one exists.
    async fn get(&self, series: &str, user_id: u64)
        -> Result<Option<RememberMeToken>, AppError>;

    /// Replace the stored value and timestamp for the token's (series, user)
    /// key. Must be a single atomic write per key so that at most one "next
    /// value" wins when rotations race.
    async fn update(&self, token: &RememberMeToken) -> Result<(), AppError>;

    /// Remove every series belonging to the user. Used for the theft
    /// response and for logout-everywhere.
    async fn delete_all_for_user(&self, user_id: u64) -> Result<(), AppError>;
}
