// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read/modify/write access to the admin ledger.
//!
//! The identity provider has no compare-and-swap, so every ledger write in
//! this process goes through a single async mutex. Holding a [`LedgerGuard`]
//! makes a check-then-act sequence (such as redeeming a token) atomic with
//! respect to every other ledger writer in the same process.

use crate::db::IdentityDb;
use crate::error::{AppError, Result};
use crate::models::AdminLedger;
use crate::services::directory::AdminDirectory;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

pub struct LedgerStore {
    db: IdentityDb,
    directory: Arc<AdminDirectory>,
    write_lock: Mutex<()>,
}

/// Exclusive handle on the ledger. Changes are written back by [`LedgerGuard::save`].
pub struct LedgerGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    db: &'a IdentityDb,
    owner_id: String,
    pub ledger: AdminLedger,
}

impl LedgerStore {
    pub fn new(db: IdentityDb, directory: Arc<AdminDirectory>) -> Self {
        Self {
            db,
            directory,
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the ledger, or `None` when no admin account exists.
    pub async fn read(&self) -> Result<Option<AdminLedger>> {
        match self.directory.ledger_owner().await? {
            Some(owner) => Ok(Some(parse_ledger(&owner.id, &owner.public_metadata)?)),
            None => Ok(None),
        }
    }

    /// Lock the ledger for update. `None` when no admin account exists.
    pub async fn lock_existing(&self) -> Result<Option<LedgerGuard<'_>>> {
        let guard = self.write_lock.lock().await;

        // Re-read under the lock so the snapshot reflects every earlier write.
        let Some(owner) = self.directory.ledger_owner().await? else {
            return Ok(None);
        };
        let ledger = parse_ledger(&owner.id, &owner.public_metadata)?;

        Ok(Some(LedgerGuard {
            _guard: guard,
            db: &self.db,
            owner_id: owner.id,
            ledger,
        }))
    }

    /// Lock the ledger for update, failing when no admin account exists.
    pub async fn lock(&self) -> Result<LedgerGuard<'_>> {
        self.lock_existing().await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "No admin account is available to hold the access ledger"
            ))
        })
    }
}

impl LedgerGuard<'_> {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Write the current ledger back to the owner's public metadata.
    pub async fn save(&self) -> Result<()> {
        let patch = self
            .ledger
            .to_metadata()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode ledger: {}", e)))?;

        self.db.update_public_metadata(&self.owner_id, &patch).await?;

        tracing::debug!(
            owner_id = %self.owner_id,
            approvals = self.ledger.document_approvals.len(),
            invitations = self.ledger.magic_links.len(),
            audit_entries = self.ledger.access_audit_log.len(),
            "Ledger saved"
        );
        Ok(())
    }
}

fn parse_ledger(
    owner_id: &str,
    metadata: &serde_json::Map<String, serde_json::Value>,
) -> Result<AdminLedger> {
    AdminLedger::from_metadata(metadata).map_err(|e| {
        tracing::error!(owner_id, error = %e, "Admin ledger is malformed");
        AppError::Internal(anyhow::anyhow!("Malformed admin ledger: {}", e))
    })
}
