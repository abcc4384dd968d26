// SPDX-License-Identifier: MIT

//! In-memory reference backend for the store traits.
//!
//! Backs the development server and the test suite. The maps are keyed the
//! same way a durable engine would key its rows: users by id with a unique
//! index on twitter id, access tokens by (user, service), remember-me
//! tokens by (series, user).

use crate::db::{AccessTokenStore, IdentityStore, TokenSeriesStore};
use crate::error::AppError;
use crate::models::{AccessToken, RememberMeToken, User};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One store instance implements all three contracts; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: std::sync::Arc<DashMap<u64, User>>,
    /// twitter_id -> user id unique index
    twitter_index: std::sync::Arc<DashMap<u64, u64>>,
    access_tokens: std::sync::Arc<DashMap<(u64, String), AccessToken>>,
    remember_me: std::sync::Arc<DashMap<(String, u64), RememberMeToken>>,
    next_id: std::sync::Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create(&self, user: &User) -> Result<User, AppError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).max(1);

        let mut created = user.clone();
        created.id = Some(id);

        // Row first, index second: once the index entry is visible, the row
        // it points at must already resolve, so a create-race loser's
        // re-read by twitter id always finds the winner.
        self.users.insert(id, created.clone());

        // The unique index insert is the atomic "only one create wins" point:
        // the entry is only written if the twitter id is unseen.
        let mut won = false;
        self.twitter_index
            .entry(user.twitter_id)
            .or_insert_with(|| {
                won = true;
                id
            });
        if !won {
            self.users.remove(&id);
            return Err(AppError::AlreadyExists(format!(
                "user with twitter id {}",
                user.twitter_id
            )));
        }

        Ok(created)
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_by_twitter_id(&self, twitter_id: u64) -> Result<Option<User>, AppError> {
        let Some(id) = self.twitter_index.get(&twitter_id).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn update(&self, user: &User) -> Result<(), AppError> {
        let id = user
            .id
            .ok_or_else(|| AppError::Database("update of user without id".to_string()))?;
        if !self.users.contains_key(&id) {
            return Err(AppError::Database(format!("no user with id {id}")));
        }
        self.users.insert(id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryStore {
    async fn get(&self, user_id: u64, service: &str) -> Result<Option<AccessToken>, AppError> {
        Ok(self
            .access_tokens
            .get(&(user_id, service.to_string()))
            .map(|t| t.clone()))
    }

    async fn put(&self, user_id: u64, token: &AccessToken) -> Result<(), AppError> {
        self.access_tokens
            .insert((user_id, token.service.clone()), token.clone());
        Ok(())
    }
}

#[async_trait]
impl TokenSeriesStore for MemoryStore {
    async fn create(&self, token: &RememberMeToken) -> Result<(), AppError> {
        let key = (token.series.clone(), token.user_id);
        let mut won = false;
        self.remember_me.entry(key).or_insert_with(|| {
            won = true;
            token.clone()
        });
        if !won {
            return Err(AppError::AlreadyExists(format!(
                "remember-me series for user {}",
                token.user_id
            )));
        }
        Ok(())
    }

    async fn get(
        &self,
        series: &str,
        user_id: u64,
    ) -> Result<Option<RememberMeToken>, AppError> {
        Ok(self
            .remember_me
            .get(&(series.to_string(), user_id))
            .map(|t| t.clone()))
    }

    async fn update(&self, token: &RememberMeToken) -> Result<(), AppError> {
        let key = (token.series.clone(), token.user_id);
        // Entry-based write so concurrent rotations serialize on the shard
        // lock; exactly one next value wins.
        match self.remember_me.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut e) => {
                e.insert(token.clone());
                Ok(())
            }
            dashmap::mapref::entry::Entry::Vacant(_) => Err(AppError::Database(format!(
                "no remember-me token for series {} / user {}",
                token.series, token.user_id
            ))),
        }
    }

    async fn delete_all_for_user(&self, user_id: u64) -> Result<(), AppError> {
        self.remember_me.retain(|(_, uid), _| *uid != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_create_assigns_id_and_enforces_twitter_uniqueness() {
        let store = MemoryStore::new();
        let user = User::for_twitter_id(42);

        let created = IdentityStore::create(&store, &user).await.unwrap();
        assert!(created.id.is_some());

        let err = IdentityStore::create(&store, &user).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        let found = store.get_by_twitter_id(42).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_create_race_loser_leaves_no_orphan_row() {
        let store = MemoryStore::new();

        let winner = IdentityStore::create(&store, &User::for_twitter_id(42))
            .await
            .unwrap();
        let err = IdentityStore::create(&store, &User::for_twitter_id(42))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        // The loser's pre-inserted row was rolled back and the index still
        // resolves to the winner.
        let loser_id = winner.id.unwrap() + 1;
        assert!(store.get_by_id(loser_id).await.unwrap().is_none());
        let found = store.get_by_twitter_id(42).await.unwrap().unwrap();
        assert_eq!(found.id, winner.id);
    }

    #[tokio::test]
    async fn test_remember_me_series_is_unique_per_user() {
        let store = MemoryStore::new();
        let token = RememberMeToken::new("abc".to_string(), 1, "v1".to_string(), Utc::now());

        TokenSeriesStore::create(&store, &token).await.unwrap();
        let err = TokenSeriesStore::create(&store, &token).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        // Same series for a different user is a different key.
        let other = RememberMeToken::new("abc".to_string(), 2, "v1".to_string(), Utc::now());
        TokenSeriesStore::create(&store, &other).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_for_user_leaves_other_users_alone() {
        let store = MemoryStore::new();
        for series in ["s1", "s2"] {
            let token =
                RememberMeToken::new(series.to_string(), 1, "v".to_string(), Utc::now());
            TokenSeriesStore::create(&store, &token).await.unwrap();
        }
        let other = RememberMeToken::new("s1".to_string(), 2, "v".to_string(), Utc::now());
        TokenSeriesStore::create(&store, &other).await.unwrap();

        store.delete_all_for_user(1).await.unwrap();

        assert!(TokenSeriesStore::get(&store, "s1", 1).await.unwrap().is_none());
        assert!(TokenSeriesStore::get(&store, "s2", 1).await.unwrap().is_none());
        assert!(TokenSeriesStore::get(&store, "s1", 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_access_token_overwrites_per_user_service() {
        use crate::models::TokenKind;
        let store = MemoryStore::new();
        let mk = |value: &str| AccessToken {
            service: "twitter".to_string(),
            value: value.to_string(),
            kind: TokenKind::OAuth1 {
                secret: "s".to_string(),
            },
        };

        store.put(1, &mk("first")).await.unwrap();
        store.put(1, &mk("second")).await.unwrap();

        let stored = AccessTokenStore::get(&store, 1, "twitter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.value, "second");
    }
}
