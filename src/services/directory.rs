// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin account lookup.
//!
//! Any number of accounts may carry the admin flag. One of them owns the
//! ledger: the configured `ADMIN_LEDGER_USER_ID`, or else the first admin
//! found by paging through identities. The discovered id is cached so the
//! scan runs once per process.

use crate::db::IdentityDb;
use crate::error::Result;
use crate::models::UserIdentity;
use tokio::sync::RwLock;

pub struct AdminDirectory {
    db: IdentityDb,
    configured_owner: Option<String>,
    cached_owner: RwLock<Option<String>>,
}

impl AdminDirectory {
    pub fn new(db: IdentityDb, configured_owner: Option<String>) -> Self {
        Self {
            db,
            configured_owner,
            cached_owner: RwLock::new(None),
        }
    }

    /// Whether `user_id` exists and carries the admin flag.
    pub async fn is_admin(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get_user(user_id)
            .await?
            .is_some_and(|u| u.is_admin()))
    }

    /// The account whose public metadata holds the ledger, if any admin exists.
    pub async fn ledger_owner(&self) -> Result<Option<UserIdentity>> {
        if let Some(id) = &self.configured_owner {
            let owner = self.db.get_user(id).await?;
            if owner.is_none() {
                tracing::warn!(user_id = %id, "Configured ledger owner does not exist");
            }
            return Ok(owner);
        }

        let cached = self.cached_owner.read().await.clone();
        if let Some(id) = cached {
            match self.db.get_user(&id).await? {
                Some(user) if user.is_admin() => return Ok(Some(user)),
                _ => {
                    tracing::info!(user_id = %id, "Cached ledger owner is no longer an admin");
                    *self.cached_owner.write().await = None;
                }
            }
        }

        let found = self.db.find_user(UserIdentity::is_admin).await?;
        match &found {
            Some(user) => {
                tracing::info!(user_id = %user.id, "Located ledger owner");
                *self.cached_owner.write().await = Some(user.id.clone());
            }
            None => tracing::warn!("No admin account found"),
        }
        Ok(found)
    }

    /// Every admin-flagged account.
    pub async fn admin_accounts(&self) -> Result<Vec<UserIdentity>> {
        Ok(self
            .db
            .all_users()
            .await?
            .into_iter()
            .filter(UserIdentity::is_admin)
            .collect())
    }

    /// Verified addresses of every admin, de-duplicated.
    pub async fn admin_emails(&self) -> Result<Vec<String>> {
        let mut emails: Vec<String> = self
            .admin_accounts()
            .await?
            .iter()
            .flat_map(UserIdentity::verified_emails)
            .collect();
        emails.sort();
        emails.dedup();
        Ok(emails)
    }
}
