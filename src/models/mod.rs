// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod token;
pub mod user;

pub use token::{AccessToken, RememberMeToken, RequestToken, TokenKind};
pub use user::{ProfileFields, User};
