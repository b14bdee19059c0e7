// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-document approval lists and retroactive grants.
//!
//! Saving a list replaces it wholesale, then grants the document to every
//! existing user with a matching verified address.

use crate::db::IdentityDb;
use crate::error::Result;
use crate::models::{AuditEntry, GrantMethod};
use crate::services::grants::GrantService;
use crate::services::ledger::LedgerStore;
use crate::validation::normalize_emails;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outcome of saving an approval list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApprovalUpdate {
    /// Stored list, normalized and de-duplicated
    pub approved_emails: Vec<String>,
    /// Input entries that are not email addresses
    pub rejected_emails: Vec<String>,
    /// Users newly granted the document by this save
    pub granted_users: Vec<String>,
    /// Users that matched but could not be updated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_users: Vec<String>,
}

#[derive(Clone)]
pub struct ApprovalService {
    db: IdentityDb,
    ledger: Arc<LedgerStore>,
    grants: GrantService,
}

impl ApprovalService {
    pub fn new(db: IdentityDb, ledger: Arc<LedgerStore>, grants: GrantService) -> Self {
        Self { db, ledger, grants }
    }

    /// Approved addresses for a document. Empty when no ledger exists.
    pub async fn approved_emails(&self, document_id: &str) -> Result<Vec<String>> {
        Ok(self
            .ledger
            .read()
            .await?
            .map(|ledger| ledger.approved_emails(document_id))
            .unwrap_or_default())
    }

    /// Replace the approval list for `document_id` and grant it to matching users.
    pub async fn set_approved_emails<S: AsRef<str>>(
        &self,
        document_id: &str,
        emails: &[S],
    ) -> Result<ApprovalUpdate> {
        let normalized = normalize_emails(emails);
        if !normalized.rejected.is_empty() {
            tracing::info!(
                document_id,
                rejected = ?normalized.rejected,
                "Ignoring invalid approval entries"
            );
        }

        let mut guard = self.ledger.lock().await?;
        guard
            .ledger
            .set_approved_emails(document_id, normalized.valid.clone());
        guard.save().await?;

        let approved: BTreeSet<String> = normalized.valid.iter().cloned().collect();
        let mut update = ApprovalUpdate {
            approved_emails: normalized.valid,
            rejected_emails: normalized.rejected,
            ..Default::default()
        };
        if approved.is_empty() {
            return Ok(update);
        }

        let document = [document_id.to_string()];
        for user in self.db.all_users().await? {
            let Some(email) = user
                .verified_emails()
                .into_iter()
                .find(|e| approved.contains(e))
            else {
                continue;
            };
            if user.document_access().contains(document_id) {
                continue;
            }

            match self.grants.grant(&user.id, &document).await {
                Ok(added) if !added.is_empty() => {
                    guard.ledger.record(AuditEntry::new(
                        &user.id,
                        email,
                        document.to_vec(),
                        GrantMethod::BulkEmail,
                    ));
                    update.granted_users.push(user.id);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        document_id,
                        error = %e,
                        "Retroactive grant failed"
                    );
                    update.failed_users.push(user.id);
                }
            }
        }

        if !update.granted_users.is_empty() {
            guard.save().await?;
        }

        tracing::info!(
            document_id,
            approved = update.approved_emails.len(),
            granted = update.granted_users.len(),
            failed = update.failed_users.len(),
            "Approval list saved"
        );
        Ok(update)
    }
}
