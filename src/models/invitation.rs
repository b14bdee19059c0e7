// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-use invitation ("magic link") tokens.
//!
//! A token moves from pending to either expired or redeemed and never leaves
//! those states. Revocation deletes the record outright.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Derived lifecycle state of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum InvitationStatus {
    Pending,
    Expired,
    Redeemed,
}

/// Stored invitation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationToken {
    pub token: String,
    pub document_id: String,
    /// Target address, lower-cased
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_by: Option<String>,
    /// Admin who issued the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl InvitationToken {
    /// Issue a fresh token for `email` on `document_id`.
    pub fn issue(
        document_id: &str,
        email: &str,
        created_by: Option<&str>,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            token: generate_token()?,
            document_id: document_id.to_string(),
            email: email.to_lowercase(),
            created_at: now,
            expires_at: now + lifetime,
            redeemed_at: None,
            redeemed_by: None,
            created_by: created_by.map(str::to_string),
        })
    }

    /// State at `now`. Redemption wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.redeemed_at.is_some() {
            InvitationStatus::Redeemed
        } else if now > self.expires_at {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Pending
        }
    }

    /// Transition pending -> redeemed. Returns false if the token was not pending.
    pub fn mark_redeemed(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.status_at(now) != InvitationStatus::Pending {
            return false;
        }
        self.redeemed_at = Some(now);
        self.redeemed_by = Some(user_id.to_string());
        true
    }
}

/// Generate a URL-safe token from the system CSPRNG.
pub fn generate_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("System random generator failed"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
