// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Docgate: gated access to client documents.
//!
//! This crate provides the backend API that decides who may read which
//! document: per-document approval lists, single-use invitation links,
//! signup reconciliation and admin overrides. Identities and all state
//! live in the hosted identity provider's user metadata.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod validation;

use anyhow::Context;
use config::Config;
use db::IdentityDb;
use services::{
    AdminDirectory, ApprovalService, EmailService, GrantService, InvitationService, LedgerStore,
    NotificationService, SignupService, WebhookVerifier,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: IdentityDb,
    pub email: EmailService,
    pub directory: Arc<AdminDirectory>,
    pub ledger: Arc<LedgerStore>,
    pub grants: GrantService,
    pub approvals: ApprovalService,
    pub invitations: InvitationService,
    pub notifications: NotificationService,
    pub signup: SignupService,
    pub webhook_verifier: WebhookVerifier,
}

impl AppState {
    /// Wire up every service over one identity store and email backend.
    pub fn new(config: Config, db: IdentityDb, email: EmailService) -> anyhow::Result<Arc<Self>> {
        let webhook_verifier = WebhookVerifier::new(&config.webhook_signing_secret)
            .context("WEBHOOK_SIGNING_SECRET is not a valid signing secret")?;

        let directory = Arc::new(AdminDirectory::new(
            db.clone(),
            config.admin_ledger_user_id.clone(),
        ));
        let ledger = Arc::new(LedgerStore::new(db.clone(), directory.clone()));
        let grants = GrantService::new(db.clone(), ledger.clone());
        let approvals = ApprovalService::new(db.clone(), ledger.clone(), grants.clone());
        let invitations = InvitationService::new(
            db.clone(),
            ledger.clone(),
            grants.clone(),
            email.clone(),
            &config.site_url,
        );
        let notifications = NotificationService::new(directory.clone(), email.clone());
        let signup = SignupService::new(ledger.clone(), grants.clone(), notifications.clone());

        Ok(Arc::new(Self {
            config,
            db,
            email,
            directory,
            ledger,
            grants,
            approvals,
            invitations,
            notifications,
            signup,
            webhook_verifier,
        }))
    }
}
