// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod approvals;
pub mod directory;
pub mod email;
pub mod grants;
pub mod invitations;
pub mod ledger;
pub mod notifications;
pub mod signature;
pub mod signup;

pub use approvals::{ApprovalService, ApprovalUpdate};
pub use directory::AdminDirectory;
pub use email::{EmailService, SendOutcome};
pub use grants::{AccessAction, GrantService};
pub use invitations::{InvitationResult, InvitationService, InvitationView, Redemption};
pub use ledger::LedgerStore;
pub use notifications::NotificationService;
pub use signature::{SignatureError, WebhookVerifier};
pub use signup::{SignupEvent, SignupOutcome, SignupService};
