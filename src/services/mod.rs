// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod authenticator;
pub mod remember_me;
pub mod twitter;

pub use authenticator::OAuthAuthenticator;
pub use remember_me::RememberMeManager;
pub use twitter::{OAuthProviderClient, TwitterClient, TwitterProfile};
