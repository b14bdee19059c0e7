// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment and read
//! once at startup.

use std::env;

/// Default identity provider backend API.
pub const DEFAULT_IDENTITY_API_URL: &str = "https://api.clerk.com/v1";

/// Default lifetime of an invitation link, in days.
pub const DEFAULT_INVITATION_EXPIRY_DAYS: i64 = 7;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public site URL used for redemption links, sign-in links and CORS
    pub site_url: String,
    /// Identity provider backend API base URL
    pub identity_api_url: String,
    /// Explicit id of the admin account that holds the access ledger
    pub admin_ledger_user_id: Option<String>,
    /// Sender address for outgoing email
    pub email_from: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// HS256 key used by the identity provider to sign session tokens
    pub session_signing_key: Vec<u8>,
    /// Signup webhook signing secret (`whsec_...`)
    pub webhook_signing_secret: String,
    /// Identity provider secret key; `None` selects the in-memory store
    pub identity_secret_key: Option<String>,
    /// Email provider API key; `None` turns email into a logged no-op
    pub email_api_key: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".to_string(),
            identity_api_url: DEFAULT_IDENTITY_API_URL.to_string(),
            admin_ledger_user_id: None,
            email_from: "Documents <documents@localhost>".to_string(),
            port: 8080,
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
            // base64("test_webhook_secret_bytes")
            webhook_signing_secret: "whsec_dGVzdF93ZWJob29rX3NlY3JldF9ieXRlcw==".to_string(),
            identity_secret_key: None,
            email_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            site_url: env::var("SITE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            identity_api_url: env::var("IDENTITY_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_IDENTITY_API_URL.to_string()),
            admin_ledger_user_id: optional_var("ADMIN_LEDGER_USER_ID"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Documents <documents@localhost>".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
                .trim()
                .as_bytes()
                .to_vec(),
            webhook_signing_secret: env::var("WEBHOOK_SIGNING_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WEBHOOK_SIGNING_SECRET"))?,
            identity_secret_key: optional_var("IDENTITY_SECRET_KEY"),
            email_api_key: optional_var("EMAIL_API_KEY"),
        })
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
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
        env::set_var("SESSION_SIGNING_KEY", "test_session_key_32_bytes_min!!!");
        env::set_var("WEBHOOK_SIGNING_SECRET", " whsec_c2VjcmV0 ");
        env::set_var("SITE_URL", "https://docs.example.com/");
        env::set_var("EMAIL_API_KEY", "   ");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.site_url, "https://docs.example.com");
        assert_eq!(config.webhook_signing_secret, "whsec_c2VjcmV0");
        assert_eq!(config.email_api_key, None);
        assert_eq!(config.port, 8080);
    }
}
