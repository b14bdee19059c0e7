//! User identity as seen by the access engine.

use crate::db::metadata_keys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A user record owned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque provider id
    pub id: String,
    /// Verified email addresses, as stored by the provider
    pub emails: Vec<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Publicly readable metadata (admin flag, and the ledger on the ledger owner)
    #[serde(default)]
    pub public_metadata: Map<String, Value>,
    /// Server-only metadata (document access grants)
    #[serde(default)]
    pub private_metadata: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserIdentity {
    /// Minimal identity with the given verified emails and empty metadata.
    pub fn new(id: impl Into<String>, emails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            emails: emails.into_iter().map(Into::into).collect(),
            first_name: None,
            last_name: None,
            public_metadata: Map::new(),
            private_metadata: Map::new(),
            created_at: None,
        }
    }

    /// Builder helper marking the identity as an admin.
    pub fn with_admin_flag(mut self) -> Self {
        self.public_metadata
            .insert(metadata_keys::IS_ADMIN.to_string(), Value::Bool(true));
        self
    }

    /// Admin status is carried in public metadata, either as `isAdmin: true`
    /// or as `role: "admin"`.
    pub fn is_admin(&self) -> bool {
        let flag = self
            .public_metadata
            .get(metadata_keys::IS_ADMIN)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let role = self
            .public_metadata
            .get(metadata_keys::ROLE)
            .and_then(Value::as_str)
            .is_some_and(|r| r.eq_ignore_ascii_case("admin"));
        flag || role
    }

    /// Lower-cased verified addresses.
    pub fn verified_emails(&self) -> BTreeSet<String> {
        self.emails
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Case-insensitive membership test against the verified addresses.
    pub fn has_email(&self, email: &str) -> bool {
        self.verified_emails().contains(&email.trim().to_lowercase())
    }

    /// First verified address, lower-cased.
    pub fn primary_email(&self) -> Option<String> {
        self.emails.first().map(|e| e.trim().to_lowercase())
    }

    /// Documents granted in private metadata. Malformed entries are ignored.
    pub fn document_access(&self) -> BTreeSet<String> {
        document_access_from(&self.private_metadata)
    }

    /// Human-readable name for notifications.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            self.primary_email().unwrap_or_else(|| self.id.clone())
        } else {
            parts.join(" ")
        }
    }
}

/// Read the document access set out of a private metadata object.
pub fn document_access_from(private_metadata: &Map<String, Value>) -> BTreeSet<String> {
    private_metadata
        .get(metadata_keys::DOCUMENT_ACCESS)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Metadata patch that stores the given document access set.
pub fn document_access_patch(documents: &BTreeSet<String>) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert(
        metadata_keys::DOCUMENT_ACCESS.to_string(),
        Value::Array(documents.iter().cloned().map(Value::String).collect()),
    );
    patch
}
