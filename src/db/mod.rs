//! Identity store layer (hosted identity provider, or in-memory for local runs).

pub mod clerk;
pub mod identity;

pub use identity::IdentityDb;

/// Metadata key names as constants.
pub mod metadata_keys {
    /// Public metadata: admin flag
    pub const IS_ADMIN: &str = "isAdmin";
    /// Public metadata: alternative role-based admin flag
    pub const ROLE: &str = "role";
    /// Public metadata (ledger owner): document id -> approved emails
    pub const DOCUMENT_APPROVALS: &str = "documentApprovals";
    /// Public metadata (ledger owner): invitation tokens
    pub const MAGIC_LINKS: &str = "magicLinks";
    /// Public metadata (ledger owner): recent audit entries
    pub const ACCESS_AUDIT_LOG: &str = "accessAuditLog";
    /// Private metadata: granted document ids
    pub const DOCUMENT_ACCESS: &str = "documentAccess";

    pub const LEDGER_KEYS: [&str; 3] = [DOCUMENT_APPROVALS, MAGIC_LINKS, ACCESS_AUDIT_LOG];
}
