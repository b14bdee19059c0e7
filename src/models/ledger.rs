// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The admin ledger: approval lists, invitation tokens and recent audit
//! entries, stored in the public metadata of the ledger-owner admin account.

use crate::db::metadata_keys;
use crate::models::audit::{AuditEntry, AUDIT_LOG_CAPACITY};
use crate::models::invitation::InvitationToken;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLedger {
    /// Document id -> approved lower-cased emails
    #[serde(default)]
    pub document_approvals: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub magic_links: Vec<InvitationToken>,
    /// Oldest first, at most [`AUDIT_LOG_CAPACITY`] entries
    #[serde(default)]
    pub access_audit_log: Vec<AuditEntry>,
}

impl AdminLedger {
    /// Extract the ledger keys from a public metadata object, ignoring the rest.
    pub fn from_metadata(metadata: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut ledger = Map::new();
        for key in metadata_keys::LEDGER_KEYS {
            if let Some(value) = metadata.get(key) {
                if !value.is_null() {
                    ledger.insert(key.to_string(), value.clone());
                }
            }
        }
        serde_json::from_value(Value::Object(ledger))
    }

    /// Metadata patch holding exactly the ledger keys.
    pub fn to_metadata(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => unreachable!("AdminLedger serializes to an object"),
        }
    }

    // ─── Approval lists ──────────────────────────────────────────

    pub fn approved_emails(&self, document_id: &str) -> Vec<String> {
        self.document_approvals
            .get(document_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the list for a document wholesale.
    pub fn set_approved_emails(&mut self, document_id: &str, emails: Vec<String>) {
        self.document_approvals
            .insert(document_id.to_string(), emails);
    }

    /// Documents whose approval list contains any of `emails` (lower-cased).
    pub fn matching_documents(&self, emails: &BTreeSet<String>) -> Vec<String> {
        self.document_approvals
            .iter()
            .filter(|(_, approved)| approved.iter().any(|a| emails.contains(a)))
            .map(|(document_id, _)| document_id.clone())
            .collect()
    }

    // ─── Invitations ─────────────────────────────────────────────

    pub fn invitation(&self, token: &str) -> Option<&InvitationToken> {
        self.magic_links.iter().find(|t| t.token == token)
    }

    pub fn invitation_mut(&mut self, token: &str) -> Option<&mut InvitationToken> {
        self.magic_links.iter_mut().find(|t| t.token == token)
    }

    pub fn add_invitations(&mut self, tokens: impl IntoIterator<Item = InvitationToken>) {
        self.magic_links.extend(tokens);
    }

    /// Delete a token record. Returns the removed record, if any.
    pub fn remove_invitation(&mut self, token: &str) -> Option<InvitationToken> {
        let index = self.magic_links.iter().position(|t| t.token == token)?;
        Some(self.magic_links.remove(index))
    }

    // ─── Audit ───────────────────────────────────────────────────

    /// Append an audit entry, dropping the oldest beyond capacity.
    pub fn record(&mut self, entry: AuditEntry) {
        entry.emit();
        self.access_audit_log.push(entry);
        if self.access_audit_log.len() > AUDIT_LOG_CAPACITY {
            let excess = self.access_audit_log.len() - AUDIT_LOG_CAPACITY;
            self.access_audit_log.drain(..excess);
        }
    }

    /// Retained audit entries, newest first.
    pub fn recent_audit(&self) -> Vec<AuditEntry> {
        self.access_audit_log.iter().rev().cloned().collect()
    }
}
