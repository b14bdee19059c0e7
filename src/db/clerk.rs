// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider backend API client.
//!
//! Handles:
//! - User lookup by id
//! - Paged user listing
//! - Public/private metadata updates (top-level keys merge server-side)

use crate::error::AppError;
use crate::models::UserIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity provider API client.
#[derive(Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl ClerkClient {
    /// Create a new client for the given backend API base URL.
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed building identity HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Get a user by id. Returns `None` on 404.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserIdentity>, AppError> {
        let url = format!("{}/users/{}", self.base_url, urlencoding::encode(user_id));

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let user: ClerkUser = self.check_response_json(response).await?;
        Ok(Some(user.into()))
    }

    /// List users, oldest first.
    pub async fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserIdentity>, AppError> {
        let url = format!("{}/users", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("order_by", "+created_at".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        let users: Vec<ClerkUser> = self.check_response_json(response).await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    /// Merge the given top-level keys into a user's metadata.
    pub async fn update_metadata(
        &self,
        user_id: &str,
        public_metadata: Option<&Map<String, Value>>,
        private_metadata: Option<&Map<String, Value>>,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/users/{}/metadata",
            self.base_url,
            urlencoding::encode(user_id)
        );

        let body = MetadataPatch {
            public_metadata,
            private_metadata,
        };

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }

        let _: Value = self.check_response_json(response).await?;
        Ok(())
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Identity provider rate limit hit (429)");
                return Err(AppError::IdentityProvider("Rate limit exceeded".to_string()));
            }

            return Err(AppError::IdentityProvider(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Invalid JSON response: {}", e)))
    }
}

#[derive(Serialize)]
struct MetadataPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    public_metadata: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_metadata: Option<&'a Map<String, Value>>,
}

/// User as returned by the provider API.
#[derive(Debug, Deserialize)]
pub struct ClerkUser {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub public_metadata: Map<String, Value>,
    #[serde(default)]
    pub private_metadata: Map<String, Value>,
    /// Unix milliseconds
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ClerkEmailAddress {
    pub email_address: String,
    pub verification: Option<ClerkVerification>,
}

#[derive(Debug, Deserialize)]
pub struct ClerkVerification {
    pub status: String,
}

impl ClerkEmailAddress {
    pub fn is_verified(&self) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|v| v.status == "verified")
    }
}

impl From<ClerkUser> for UserIdentity {
    fn from(user: ClerkUser) -> Self {
        Self {
            id: user.id,
            emails: user
                .email_addresses
                .into_iter()
                .filter(ClerkEmailAddress::is_verified)
                .map(|e| e.email_address)
                .collect(),
            first_name: user.first_name,
            last_name: user.last_name,
            public_metadata: user.public_metadata,
            private_metadata: user.private_metadata,
            created_at: user
                .created_at
                .and_then(chrono::DateTime::from_timestamp_millis),
        }
    }
}
