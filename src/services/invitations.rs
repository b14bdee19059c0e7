// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Invitation issuance, listing, revocation and redemption.
//!
//! Tokens are written to the ledger before any email goes out, so a link
//! that reaches an inbox always resolves. Tokens whose email could not be
//! delivered are withdrawn afterwards.
//!
//! Redemption holds the ledger lock from the pending check until the token
//! is marked redeemed, so two concurrent redemptions of one token in this
//! process cannot both succeed.

use crate::db::IdentityDb;
use crate::error::{AppError, Result};
use crate::models::{AuditEntry, GrantMethod, InvitationStatus, InvitationToken};
use crate::services::email::{invitation_email, EmailService, SendOutcome};
use crate::services::grants::GrantService;
use crate::services::ledger::LedgerStore;
use crate::validation::{is_valid_document_id, normalize_emails};
use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

/// Longest invitation lifetime an admin may request.
pub const MAX_EXPIRY_DAYS: i64 = 90;

/// Invitation emails in flight at once.
const MAX_CONCURRENT_SENDS: usize = 4;

/// Per-recipient outcome of an issuance batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResult {
    pub email: String,
    pub success: bool,
    /// False when email is disabled and the link must be shared by hand
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvitationResult {
    fn failed(email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            success: false,
            email_sent: false,
            token: None,
            url: None,
            expires_at: None,
            error: Some(error.into()),
        }
    }
}

/// A stored token with its derived status, for the admin listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    #[serde(flatten)]
    pub record: InvitationToken,
    pub status: InvitationStatus,
    pub url: String,
}

/// Result of visiting a redemption link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Redemption {
    /// No such token (never issued, or revoked)
    Invalid,
    Expired {
        document_id: String,
    },
    AlreadyUsed {
        document_id: String,
    },
    /// Valid token, but no signed-in caller. Retry after signing in.
    NeedsAuthentication {
        token: String,
        email: String,
        document_id: String,
        sign_in_url: String,
    },
    /// Signed-in caller has no verified address matching the token.
    EmailMismatch {
        expected_email: String,
    },
    Redeemed {
        document_id: String,
    },
}

#[derive(Clone)]
pub struct InvitationService {
    db: IdentityDb,
    ledger: Arc<LedgerStore>,
    grants: GrantService,
    email: EmailService,
    site_url: String,
}

impl InvitationService {
    pub fn new(
        db: IdentityDb,
        ledger: Arc<LedgerStore>,
        grants: GrantService,
        email: EmailService,
        site_url: &str,
    ) -> Self {
        Self {
            db,
            ledger,
            grants,
            email,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public redemption page for a token.
    pub fn invitation_url(&self, token: &str) -> String {
        format!("{}/magic-link/{}", self.site_url, urlencoding::encode(token))
    }

    /// Sign-in page that returns to the redemption page afterwards.
    pub fn sign_in_url(&self, token: &str) -> String {
        format!(
            "{}/sign-in?redirect_url={}",
            self.site_url,
            urlencoding::encode(&self.invitation_url(token))
        )
    }

    // ─── Issue ───────────────────────────────────────────────────

    /// Issue one token per distinct valid address and email each recipient.
    pub async fn create<S: AsRef<str>>(
        &self,
        document_id: &str,
        emails: &[S],
        expires_in_days: i64,
        created_by: &str,
    ) -> Result<Vec<InvitationResult>> {
        if !is_valid_document_id(document_id) {
            return Err(AppError::BadRequest(format!(
                "Invalid document id: {}",
                document_id
            )));
        }
        if !(1..=MAX_EXPIRY_DAYS).contains(&expires_in_days) {
            return Err(AppError::BadRequest(format!(
                "expiresInDays must be between 1 and {}",
                MAX_EXPIRY_DAYS
            )));
        }
        if emails.is_empty() {
            return Err(AppError::BadRequest(
                "At least one email address is required".to_string(),
            ));
        }

        let normalized = normalize_emails(emails);
        let mut results: Vec<InvitationResult> = Vec::with_capacity(emails.len());

        if !normalized.valid.is_empty() {
            let now = Utc::now();
            let lifetime = Duration::days(expires_in_days);
            let tokens = normalized
                .valid
                .iter()
                .map(|email| {
                    InvitationToken::issue(document_id, email, Some(created_by), now, lifetime)
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            {
                let mut guard = self.ledger.lock().await?;
                guard.ledger.add_invitations(tokens.iter().cloned());
                guard.save().await?;
            }

            tracing::info!(
                document_id,
                count = tokens.len(),
                expires_in_days,
                created_by,
                "Invitation tokens stored"
            );

            let outcomes: Vec<_> = stream::iter(tokens.iter().cloned())
                .map(|token| {
                    let url = self.invitation_url(&token.token);
                    let message =
                        invitation_email(&token.email, &token.document_id, &url, token.expires_at);
                    let email = self.email.clone();
                    async move {
                        let outcome = email.send(&message).await;
                        (token, url, outcome)
                    }
                })
                .buffered(MAX_CONCURRENT_SENDS)
                .collect()
                .await;

            let mut undelivered = Vec::new();
            for (token, url, outcome) in outcomes {
                match outcome {
                    Ok(sent) => results.push(InvitationResult {
                        email: token.email.clone(),
                        success: true,
                        email_sent: matches!(sent, SendOutcome::Sent(_)),
                        token: Some(token.token.clone()),
                        url: Some(url),
                        expires_at: Some(token.expires_at),
                        error: None,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            email = %token.email,
                            document_id,
                            error = %e,
                            "Invitation email failed"
                        );
                        results.push(InvitationResult::failed(
                            &token.email,
                            "Failed to send invitation email",
                        ));
                        undelivered.push(token.token.clone());
                    }
                }
            }

            if !undelivered.is_empty() {
                self.withdraw(&undelivered).await;
            }
        }

        results.extend(
            normalized
                .rejected
                .into_iter()
                .map(|raw| InvitationResult::failed(raw, "Invalid email address")),
        );

        Ok(results)
    }

    /// Remove tokens whose email never went out. Failures leave orphaned
    /// tokens behind, which are harmless since nobody holds the link.
    async fn withdraw(&self, tokens: &[String]) {
        let result = async {
            let mut guard = self.ledger.lock().await?;
            for token in tokens {
                guard.ledger.remove_invitation(token);
            }
            guard.save().await
        }
        .await;

        match result {
            Ok(()) => tracing::info!(count = tokens.len(), "Withdrew undelivered invitations"),
            Err(e) => tracing::error!(
                count = tokens.len(),
                error = %e,
                "Failed to withdraw undelivered invitations"
            ),
        }
    }

    // ─── List / revoke ───────────────────────────────────────────

    /// Every stored token with its status, newest first.
    pub async fn list(&self) -> Result<Vec<InvitationView>> {
        let Some(ledger) = self.ledger.read().await? else {
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let mut views: Vec<InvitationView> = ledger
            .magic_links
            .into_iter()
            .map(|record| InvitationView {
                status: record.status_at(now),
                url: self.invitation_url(&record.token),
                record,
            })
            .collect();
        views.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(views)
    }

    /// Delete a token record regardless of its state.
    pub async fn delete(&self, token: &str) -> Result<()> {
        let mut guard = self
            .ledger
            .lock_existing()
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation".to_string()))?;

        let removed = guard
            .ledger
            .remove_invitation(token)
            .ok_or_else(|| AppError::NotFound("Invitation".to_string()))?;
        guard.save().await?;

        tracing::info!(
            document_id = %removed.document_id,
            email = %removed.email,
            "Invitation revoked"
        );
        Ok(())
    }

    // ─── Redeem ──────────────────────────────────────────────────

    /// Redeem `token` for the signed-in caller, if any.
    pub async fn redeem(&self, token: &str, caller_id: Option<&str>) -> Result<Redemption> {
        let caller = match caller_id {
            Some(id) => self.db.get_user(id).await?,
            None => None,
        };

        let Some(mut guard) = self.ledger.lock_existing().await? else {
            return Ok(Redemption::Invalid);
        };

        let now = Utc::now();
        let Some(record) = guard.ledger.invitation(token).cloned() else {
            tracing::debug!("Redemption of unknown token");
            return Ok(Redemption::Invalid);
        };

        match record.status_at(now) {
            InvitationStatus::Redeemed => {
                return Ok(Redemption::AlreadyUsed {
                    document_id: record.document_id,
                })
            }
            InvitationStatus::Expired => {
                return Ok(Redemption::Expired {
                    document_id: record.document_id,
                })
            }
            InvitationStatus::Pending => {}
        }

        let Some(user) = caller else {
            return Ok(Redemption::NeedsAuthentication {
                sign_in_url: self.sign_in_url(&record.token),
                token: record.token,
                email: record.email,
                document_id: record.document_id,
            });
        };

        if !user.has_email(&record.email) {
            tracing::info!(
                user_id = %user.id,
                document_id = %record.document_id,
                "Invitation email mismatch"
            );
            return Ok(Redemption::EmailMismatch {
                expected_email: record.email,
            });
        }

        self.grants
            .grant(&user.id, std::slice::from_ref(&record.document_id))
            .await?;

        if let Some(stored) = guard.ledger.invitation_mut(token) {
            stored.mark_redeemed(&user.id, now);
        }
        guard.ledger.record(AuditEntry::new(
            &user.id,
            &record.email,
            vec![record.document_id.clone()],
            GrantMethod::MagicLink,
        ));
        guard.save().await?;

        tracing::info!(
            user_id = %user.id,
            document_id = %record.document_id,
            "Invitation redeemed"
        );
        Ok(Redemption::Redeemed {
            document_id: record.document_id,
        })
    }
}
