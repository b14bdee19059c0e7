// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin notifications.

use crate::error::Result;
use crate::models::UserIdentity;
use crate::services::directory::AdminDirectory;
use crate::services::email::{
    access_request_email, signup_notification, EmailService, OutgoingEmail, SendOutcome,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct NotificationService {
    directory: Arc<AdminDirectory>,
    email: EmailService,
}

impl NotificationService {
    pub fn new(directory: Arc<AdminDirectory>, email: EmailService) -> Self {
        Self { directory, email }
    }

    /// Tell every admin about a new account.
    pub async fn notify_signup(
        &self,
        user_id: &str,
        name: &str,
        emails: &[String],
        granted: &[String],
    ) -> Result<SendOutcome> {
        let admins = self.directory.admin_emails().await?;
        self.send_to_admins(signup_notification(&admins, user_id, name, emails, granted))
            .await
    }

    /// Forward a user's access request to every admin.
    pub async fn request_access(
        &self,
        requester: &UserIdentity,
        document_id: &str,
        message: Option<&str>,
    ) -> Result<SendOutcome> {
        let admins = self.directory.admin_emails().await?;
        self.send_to_admins(access_request_email(&admins, requester, document_id, message))
            .await
    }

    async fn send_to_admins(&self, message: OutgoingEmail) -> Result<SendOutcome> {
        if message.to.is_empty() {
            tracing::warn!(subject = %message.subject, "No admin addresses to notify");
            return Ok(SendOutcome::Skipped);
        }
        self.email.send(&message).await.inspect_err(|e| {
            if e.is_upstream() {
                tracing::warn!(subject = %message.subject, error = %e, "Admin notification failed");
            }
        })
    }
}
