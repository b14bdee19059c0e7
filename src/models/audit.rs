//! Audit entries for access-granting actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Number of entries retained in the ledger's recent-activity view.
pub const AUDIT_LOG_CAPACITY: usize = 100;

/// How a grant came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GrantMethod {
    /// Approval-list match, at signup or on approval-list save
    BulkEmail,
    /// Invitation redemption
    #[serde(alias = "invitation")]
    MagicLink,
    /// Admin toggle
    Manual,
}

impl GrantMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantMethod::BulkEmail => "bulk-email",
            GrantMethod::MagicLink => "magic-link",
            GrantMethod::Manual => "manual",
        }
    }
}

impl std::fmt::Display for GrantMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access-granting action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuditEntry {
    pub user_id: String,
    pub email: String,
    pub document_ids: Vec<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub granted_at: DateTime<Utc>,
    pub method: GrantMethod,
}

impl AuditEntry {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        document_ids: Vec<String>,
        method: GrantMethod,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            document_ids,
            granted_at: Utc::now(),
            method,
        }
    }

    /// Emit the entry on the `audit` tracing target.
    ///
    /// The ledger only keeps the most recent entries; the log stream is the
    /// complete record.
    pub fn emit(&self) {
        tracing::info!(
            target: "audit",
            user_id = %self.user_id,
            email = %self.email,
            document_ids = ?self.document_ids,
            method = %self.method,
            granted_at = %crate::time_utils::log_timestamp(self.granted_at),
            "Document access granted"
        );
    }
}
