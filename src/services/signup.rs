// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup reconciliation: grant pre-approved documents to a new account.
//!
//! Invitation tokens are left alone here. Redeeming one needs a signed-in
//! session so the caller's verified addresses can be compared.

use crate::error::Result;
use crate::models::{AuditEntry, GrantMethod, UserIdentity};
use crate::services::email::SendOutcome;
use crate::services::grants::GrantService;
use crate::services::ledger::LedgerStore;
use crate::services::notifications::NotificationService;
use crate::validation::signup_emails;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A newly created account, as reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupEvent {
    pub user_id: String,
    pub emails: Vec<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UserIdentity> for SignupEvent {
    fn from(user: UserIdentity) -> Self {
        Self {
            user_id: user.id,
            emails: user.emails,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// What reconciliation did for a signup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupOutcome {
    /// Documents added to the new user's access set
    pub granted: Vec<String>,
    pub admins_notified: bool,
}

#[derive(Clone)]
pub struct SignupService {
    ledger: Arc<LedgerStore>,
    grants: GrantService,
    notifications: NotificationService,
}

impl SignupService {
    pub fn new(
        ledger: Arc<LedgerStore>,
        grants: GrantService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            ledger,
            grants,
            notifications,
        }
    }

    /// Grant every document whose approval list names one of the new
    /// user's addresses, then notify admins. Grant failures are returned
    /// so the provider retries the delivery; notification failures are not.
    pub async fn handle_signup(&self, event: &SignupEvent) -> Result<SignupOutcome> {
        let emails = signup_emails(&event.emails);
        let mut outcome = SignupOutcome::default();

        if emails.is_empty() {
            tracing::info!(user_id = %event.user_id, "Signup has no usable email addresses");
        } else {
            outcome.granted = self.apply_approvals(&event.user_id, &emails).await?;
        }

        let profile = UserIdentity {
            first_name: event.first_name.clone(),
            last_name: event.last_name.clone(),
            ..UserIdentity::new(event.user_id.as_str(), emails.iter())
        };

        match self
            .notifications
            .notify_signup(
                &event.user_id,
                &profile.display_name(),
                &emails,
                &outcome.granted,
            )
            .await
        {
            Ok(sent) => outcome.admins_notified = matches!(sent, SendOutcome::Sent(_)),
            Err(e) => {
                tracing::warn!(user_id = %event.user_id, error = %e, "Signup notification failed")
            }
        }

        tracing::info!(
            user_id = %event.user_id,
            granted = ?outcome.granted,
            admins_notified = outcome.admins_notified,
            "Signup reconciled"
        );
        Ok(outcome)
    }

    async fn apply_approvals(&self, user_id: &str, emails: &[String]) -> Result<Vec<String>> {
        let Some(mut guard) = self.ledger.lock_existing().await? else {
            tracing::warn!(user_id, "No admin ledger; skipping approval matching");
            return Ok(Vec::new());
        };

        let addresses: BTreeSet<String> = emails.iter().cloned().collect();
        let matched = guard.ledger.matching_documents(&addresses);
        if matched.is_empty() {
            return Ok(matched);
        }

        let added = self.grants.grant(user_id, &matched).await?;
        if added.is_empty() {
            return Ok(added);
        }

        guard.ledger.record(AuditEntry::new(
            user_id,
            emails[0].clone(),
            added.clone(),
            GrantMethod::BulkEmail,
        ));
        guard.save().await?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::IdentityDb;
    use crate::services::directory::AdminDirectory;
    use crate::services::email::EmailService;

    struct Fixture {
        signup: SignupService,
        grants: GrantService,
        ledger: Arc<LedgerStore>,
        db: IdentityDb,
        email: EmailService,
    }

    async fn fixture(with_admin: bool) -> Fixture {
        let db = IdentityDb::new_memory();
        if with_admin {
            db.insert_user(UserIdentity::new("admin", ["admin@firm.com"]).with_admin_flag())
                .await
                .unwrap();
        }
        let email = EmailService::capturing("docs@firm.com");
        let directory = Arc::new(AdminDirectory::new(db.clone(), None));
        let ledger = Arc::new(LedgerStore::new(db.clone(), directory.clone()));
        let grants = GrantService::new(db.clone(), ledger.clone());
        let notifications = NotificationService::new(directory, email.clone());
        Fixture {
            signup: SignupService::new(ledger.clone(), grants.clone(), notifications),
            grants,
            ledger,
            db,
            email,
        }
    }

    #[tokio::test]
    async fn test_signup_grants_matching_documents() {
        let f = fixture(true).await;
        {
            let mut guard = f.ledger.lock().await.unwrap();
            guard
                .ledger
                .set_approved_emails("doc-a", vec!["alice@x.com".to_string()]);
            guard
                .ledger
                .set_approved_emails("doc-b", vec!["alice@x.com".to_string()]);
            guard
                .ledger
                .set_approved_emails("doc-c", vec!["carol@z.org".to_string()]);
            guard.save().await.unwrap();
        }
        f.db.insert_user(UserIdentity::new("alice", ["ALICE@x.com"]))
            .await
            .unwrap();

        let outcome = f
            .signup
            .handle_signup(&SignupEvent {
                user_id: "alice".to_string(),
                emails: vec!["ALICE@x.com".to_string(), "no-at-sign".to_string()],
                first_name: Some("Alice".to_string()),
                last_name: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.granted, vec!["doc-a", "doc-b"]);
        assert!(outcome.admins_notified);
        assert!(f.grants.has_access("alice", "doc-b").await.unwrap());
        assert!(!f.grants.has_access("alice", "doc-c").await.unwrap());

        let log = f.ledger.read().await.unwrap().unwrap().access_audit_log;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].document_ids, vec!["doc-a", "doc-b"]);
        assert_eq!(log[0].email, "alice@x.com");

        let sent = f.email.captured();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Alice"));
    }

    #[tokio::test]
    async fn test_nameless_signup_is_named_by_email() {
        let f = fixture(true).await;
        f.db.insert_user(UserIdentity::new("carol", ["carol@z.org"]))
            .await
            .unwrap();

        f.signup
            .handle_signup(&SignupEvent {
                user_id: "carol".to_string(),
                emails: vec![" Carol@Z.org".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        let sent = f.email.captured();
        assert_eq!(sent[0].subject, "New signup: carol@z.org");
    }

    #[tokio::test]
    async fn test_signup_without_admin_still_succeeds() {
        let f = fixture(false).await;
        f.db.insert_user(UserIdentity::new("bob", ["bob@y.com"]))
            .await
            .unwrap();

        let outcome = f
            .signup
            .handle_signup(&SignupEvent {
                user_id: "bob".to_string(),
                emails: vec!["bob@y.com".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.granted.is_empty());
        assert!(!outcome.admins_notified);
    }

    #[tokio::test]
    async fn test_signup_notification_failure_is_not_an_error() {
        let f = fixture(true).await;
        f.email
            .set_failing_recipients(["admin@firm.com".to_string()]);
        f.db.insert_user(UserIdentity::new("bob", ["bob@y.com"]))
            .await
            .unwrap();

        let outcome = f
            .signup
            .handle_signup(&SignupEvent {
                user_id: "bob".to_string(),
                emails: vec!["bob@y.com".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!outcome.admins_notified);
    }
}
