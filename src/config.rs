// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.

use std::env;

/// Default byte length for a remember-me series identifier.
pub const DEFAULT_SERIES_LENGTH: usize = 16;
/// Default byte length for a remember-me token value.
pub const DEFAULT_TOKEN_LENGTH: usize = 16;
/// Default remember-me validity window: 14 days.
pub const DEFAULT_REMEMBER_ME_VALIDITY_SECS: i64 = 14 * 24 * 60 * 60;
/// Session JWT lifetime. Deliberately short so the remember-me path is
/// actually exercised on returning visits.
pub const SESSION_JWT_LIFETIME_SECS: usize = 2 * 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Twitter OAuth consumer key (public)
    pub twitter_consumer_key: String,
    /// Frontend URL for post-login redirects
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Twitter OAuth consumer secret
    pub twitter_consumer_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Remember-me tuning ---
    /// Byte length of a generated series identifier
    pub series_length: usize,
    /// Byte length of a generated token value
    pub token_length: usize,
    /// How long a remember-me token stays valid, in seconds
    pub remember_me_validity_secs: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            twitter_consumer_key: env::var("TWITTER_CONSUMER_KEY")
                .map_err(|_| ConfigError::Missing("TWITTER_CONSUMER_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            twitter_consumer_secret: env::var("TWITTER_CONSUMER_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TWITTER_CONSUMER_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),

            series_length: parse_env_or("REMEMBER_ME_SERIES_LENGTH", DEFAULT_SERIES_LENGTH),
            token_length: parse_env_or("REMEMBER_ME_TOKEN_LENGTH", DEFAULT_TOKEN_LENGTH),
            remember_me_validity_secs: parse_env_or(
                "REMEMBER_ME_VALIDITY_SECS",
                DEFAULT_REMEMBER_ME_VALIDITY_SECS,
            ),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            twitter_consumer_key: "test_consumer_key".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            twitter_consumer_secret: "test_consumer_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            series_length: DEFAULT_SERIES_LENGTH,
            token_length: DEFAULT_TOKEN_LENGTH,
            remember_me_validity_secs: DEFAULT_REMEMBER_ME_VALIDITY_SECS,
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("TWITTER_CONSUMER_KEY", "test_key");
        env::set_var("TWITTER_CONSUMER_SECRET", "test_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.twitter_consumer_key, "test_key");
        assert_eq!(config.twitter_consumer_secret, "test_secret");
        assert_eq!(config.series_length, DEFAULT_SERIES_LENGTH);
        assert_eq!(config.token_length, DEFAULT_TOKEN_LENGTH);
    }
}
