// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user document access sets.
//!
//! Grants live in each user's private metadata. Read/modify/write of a
//! user's set is serialized per user id within this process.

use crate::db::IdentityDb;
use crate::error::{AppError, Result};
use crate::models::identity::document_access_patch;
use crate::models::{AuditEntry, GrantMethod};
use crate::services::ledger::LedgerStore;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user write locks, shared by every clone of the service.
pub type GrantLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Manual override action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    Grant,
    Revoke,
}

#[derive(Clone)]
pub struct GrantService {
    db: IdentityDb,
    ledger: Arc<LedgerStore>,
    locks: GrantLocks,
}

impl GrantService {
    pub fn new(db: IdentityDb, ledger: Arc<LedgerStore>) -> Self {
        Self {
            db,
            ledger,
            locks: Arc::new(DashMap::new()),
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Documents granted to a user.
    pub async fn documents(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        Ok(user.document_access())
    }

    /// Membership test. Unknown users have no access.
    pub async fn has_access(&self, user_id: &str, document_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get_user(user_id)
            .await?
            .is_some_and(|u| u.document_access().contains(document_id)))
    }

    /// Add documents to a user's set. Returns the ids that were not already present.
    pub async fn grant(&self, user_id: &str, document_ids: &[String]) -> Result<Vec<String>> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let mut documents = user.document_access();
        let added: Vec<String> = document_ids
            .iter()
            .filter(|id| documents.insert((*id).clone()))
            .cloned()
            .collect();

        if added.is_empty() {
            tracing::debug!(user_id, ?document_ids, "Documents already granted");
            return Ok(added);
        }

        self.db
            .update_private_metadata(user_id, &document_access_patch(&documents))
            .await?;

        tracing::info!(user_id, documents = ?added, "Document access granted");
        Ok(added)
    }

    /// Remove a document from a user's set. Returns whether it was present.
    pub async fn revoke(&self, user_id: &str, document_id: &str) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let mut documents = user.document_access();
        if !documents.remove(document_id) {
            return Ok(false);
        }

        self.db
            .update_private_metadata(user_id, &document_access_patch(&documents))
            .await?;

        tracing::info!(user_id, document_id, "Document access revoked");
        Ok(true)
    }

    /// Admin override. Grants are audited as `manual` even when already present.
    pub async fn update_access(
        &self,
        user_id: &str,
        document_id: &str,
        action: AccessAction,
        admin_id: &str,
    ) -> Result<BTreeSet<String>> {
        match action {
            AccessAction::Grant => {
                self.grant(user_id, &[document_id.to_string()]).await?;

                let email = self
                    .db
                    .get_user(user_id)
                    .await?
                    .and_then(|u| u.primary_email())
                    .unwrap_or_default();

                let mut guard = self.ledger.lock().await?;
                guard.ledger.record(AuditEntry::new(
                    user_id,
                    email,
                    vec![document_id.to_string()],
                    GrantMethod::Manual,
                ));
                guard.save().await?;
            }
            AccessAction::Revoke => {
                let removed = self.revoke(user_id, document_id).await?;
                tracing::info!(
                    user_id,
                    document_id,
                    admin_id,
                    removed,
                    "Manual access revocation"
                );
            }
        }

        self.documents(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserIdentity;
    use crate::services::directory::AdminDirectory;

    async fn service() -> (GrantService, IdentityDb) {
        let db = IdentityDb::new_memory();
        db.insert_user(UserIdentity::new("admin", ["admin@firm.com"]).with_admin_flag())
            .await
            .unwrap();
        db.insert_user(UserIdentity::new("user_1", ["one@x.com"]))
            .await
            .unwrap();
        let directory = Arc::new(AdminDirectory::new(db.clone(), None));
        let ledger = Arc::new(LedgerStore::new(db.clone(), directory));
        (GrantService::new(db.clone(), ledger), db)
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let (grants, _) = service().await;
        let doc = vec!["doc-a".to_string()];

        assert_eq!(grants.grant("user_1", &doc).await.unwrap(), doc);
        assert!(grants.grant("user_1", &doc).await.unwrap().is_empty());
        assert_eq!(grants.documents("user_1").await.unwrap().len(), 1);
        assert!(grants.has_access("user_1", "doc-a").await.unwrap());
        assert!(!grants.has_access("user_1", "doc-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_missing_document_is_noop() {
        let (grants, _) = service().await;
        assert!(!grants.revoke("user_1", "doc-a").await.unwrap());

        grants.grant("user_1", &["doc-a".to_string()]).await.unwrap();
        assert!(grants.revoke("user_1", "doc-a").await.unwrap());
        assert!(!grants.has_access("user_1", "doc-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (grants, _) = service().await;
        assert!(!grants.has_access("ghost", "doc-a").await.unwrap());
        assert!(matches!(
            grants.grant("ghost", &["doc-a".to_string()]).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_grants_keep_every_document() {
        let (grants, _) = service().await;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let grants = grants.clone();
                tokio::spawn(async move {
                    grants
                        .grant("user_1", &[format!("doc-{i}")])
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(grants.documents("user_1").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_manual_grant_is_audited() {
        let (grants, db) = service().await;

        let docs = grants
            .update_access("user_1", "doc-a", AccessAction::Grant, "admin")
            .await
            .unwrap();
        assert!(docs.contains("doc-a"));

        let admin = db.get_user("admin").await.unwrap().unwrap();
        let ledger = crate::models::AdminLedger::from_metadata(&admin.public_metadata).unwrap();
        assert_eq!(ledger.access_audit_log.len(), 1);
        assert_eq!(ledger.access_audit_log[0].method, GrantMethod::Manual);
        assert_eq!(ledger.access_audit_log[0].email, "one@x.com");

        let docs = grants
            .update_access("user_1", "doc-a", AccessAction::Revoke, "admin")
            .await
            .unwrap();
        assert!(docs.is_empty());
    }
}
