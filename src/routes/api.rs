// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::security::CurrentUser;
use crate::AppState;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me))
}

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    pub id: Option<u64>,
    pub twitter_id: u64,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub followers: u32,
    pub friends: u32,
    pub time_zone_id: Option<String>,
}

/// The profile of the authenticated user.
async fn get_me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        twitter_id: user.twitter_id,
        username: user.username,
        name: user.name,
        bio: user.bio,
        website: user.website,
        location: user.location,
        followers: user.followers,
        friends: user.friends,
        time_zone_id: user.time_zone_id,
    })
}
