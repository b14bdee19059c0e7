// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod audit;
pub mod identity;
pub mod invitation;
pub mod ledger;

pub use audit::{AuditEntry, GrantMethod};
pub use identity::UserIdentity;
pub use invitation::{InvitationStatus, InvitationToken};
pub use ledger::AdminLedger;
