// SPDX-License-Identifier: MIT

//! Middleware modules (request authentication).

pub mod auth;

pub use auth::authenticate;
