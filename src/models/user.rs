// SPDX-License-Identifier: MIT

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// An account holder. Everyone who logs in is a user.
///
/// The `id` is assigned by the identity store on creation and never changes
/// afterwards; `twitter_id` is the external provider identity and is unique
/// across users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque store-assigned id. None only before the first create.
    pub id: Option<u64>,
    /// Twitter's numeric id for this account, unique across users.
    pub twitter_id: u64,
    /// Twitter screen name, also used in URLs to identify the user.
    pub username: String,
    /// Display name
    pub name: String,
    /// Short bio
    pub bio: Option<String>,
    /// Website URL
    pub website: Option<String>,
    /// Free-text location
    pub location: Option<String>,
    /// Follower count as reported by the provider
    pub followers: u32,
    /// Count of accounts this user follows
    pub friends: u32,
    /// Timezone identifier, e.g. "Europe/London"
    pub time_zone_id: Option<String>,
}

impl User {
    /// A new, not-yet-persisted user for a provider identity.
    pub fn for_twitter_id(twitter_id: u64) -> Self {
        Self {
            id: None,
            twitter_id,
            username: String::new(),
            name: String::new(),
            bio: None,
            website: None,
            location: None,
            followers: 0,
            friends: 0,
            time_zone_id: None,
        }
    }

    /// Snapshot of the mutable profile content, used to decide whether a
    /// re-login actually changed anything. Identity fields (id, twitter_id)
    /// are deliberately excluded: two semantically-equal profiles always
    /// compare equal regardless of storage identity.
    pub fn profile_fields(&self) -> ProfileFields {
        ProfileFields {
            username: self.username.clone(),
            name: self.name.clone(),
            bio: self.bio.clone(),
            website: self.website.clone(),
            location: self.location.clone(),
            followers: self.followers,
            friends: self.friends,
            time_zone_id: self.time_zone_id.clone(),
        }
    }
}

/// Plain value object over a user's mutable profile fields.
///
/// Structural equality on this type is the change-detection fingerprint:
/// the identity store is only written when the snapshot taken before copying
/// provider data in differs from the one taken after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub followers: u32,
    pub friends: u32,
    pub time_zone_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Some(7),
            twitter_id: 42,
            username: "ann".to_string(),
            name: "Ann".to_string(),
            bio: Some("hello".to_string()),
            website: None,
            location: Some("London".to_string()),
            followers: 10,
            friends: 5,
            time_zone_id: Some("Europe/London".to_string()),
        }
    }

    #[test]
    fn test_profile_fields_ignore_identity() {
        let a = sample_user();
        let mut b = sample_user();
        b.id = Some(999);
        b.twitter_id = 43;
        assert_eq!(a.profile_fields(), b.profile_fields());
    }

    #[test]
    fn test_profile_fields_detect_content_change() {
        let a = sample_user();
        let mut b = sample_user();
        b.followers = 15;
        assert_ne!(a.profile_fields(), b.profile_fields());
    }
}
