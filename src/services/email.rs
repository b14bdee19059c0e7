// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email client and message templates.
//!
//! Without an API key the service logs a warning per message and reports it
//! as skipped instead of failing the caller.

use crate::error::AppError;
use crate::models::UserIdentity;
use crate::time_utils::email_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EMAIL_API_URL: &str = "https://api.resend.com/emails";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the provider (provider message id, if returned)
    Sent(Option<String>),
    /// Email is not configured; nothing was sent
    Skipped,
}

/// Email delivery service.
#[derive(Clone)]
pub struct EmailService {
    from: String,
    backend: EmailBackend,
}

#[derive(Clone)]
enum EmailBackend {
    Provider {
        http: reqwest::Client,
        api_key: String,
    },
    Disabled,
    Capture(Arc<CapturedMail>),
}

/// In-process mailbox used by the capturing backend.
#[derive(Default)]
struct CapturedMail {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing_recipients: Mutex<HashSet<String>>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

impl EmailService {
    /// Create the service. A missing key disables sending.
    pub fn new(api_key: Option<&str>, from: &str) -> Result<Self, AppError> {
        let backend = match api_key {
            Some(key) => {
                let http = reqwest::Client::builder()
                    .timeout(HTTP_TIMEOUT)
                    .build()
                    .map_err(|e| {
                        AppError::Internal(anyhow::anyhow!("Failed building email HTTP client: {}", e))
                    })?;
                EmailBackend::Provider {
                    http,
                    api_key: key.to_string(),
                }
            }
            None => {
                tracing::warn!("EMAIL_API_KEY not set; outgoing email is disabled");
                EmailBackend::Disabled
            }
        };

        Ok(Self {
            from: from.to_string(),
            backend,
        })
    }

    /// Service that records messages in memory instead of sending them.
    pub fn capturing(from: &str) -> Self {
        Self {
            from: from.to_string(),
            backend: EmailBackend::Capture(Arc::new(CapturedMail::default())),
        }
    }

    /// Whether messages actually leave the process (or are captured).
    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, EmailBackend::Disabled)
    }

    /// Send a message.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<SendOutcome, AppError> {
        match &self.backend {
            EmailBackend::Disabled => {
                tracing::warn!(
                    to = ?email.to,
                    subject = %email.subject,
                    "Email disabled, message not sent"
                );
                Ok(SendOutcome::Skipped)
            }
            EmailBackend::Capture(mail) => {
                let failing = lock(&mail.failing_recipients);
                if let Some(bad) = email.to.iter().find(|to| failing.contains(*to)) {
                    return Err(AppError::Email(format!("Recipient rejected: {}", bad)));
                }
                drop(failing);
                lock(&mail.sent).push(email.clone());
                Ok(SendOutcome::Sent(None))
            }
            EmailBackend::Provider { http, api_key } => {
                let body = SendRequest {
                    from: &self.from,
                    to: &email.to,
                    subject: &email.subject,
                    html: &email.html,
                };

                let response = http
                    .post(EMAIL_API_URL)
                    .bearer_auth(api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AppError::Email(format!("Send request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    return Err(AppError::Email(format!("HTTP {}: {}", status, detail)));
                }

                let sent: SendResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Email(format!("Invalid JSON response: {}", e)))?;

                tracing::debug!(to = ?email.to, id = ?sent.id, "Email sent");
                Ok(SendOutcome::Sent(sent.id))
            }
        }
    }

    /// Messages recorded by the capturing backend.
    pub fn captured(&self) -> Vec<OutgoingEmail> {
        match &self.backend {
            EmailBackend::Capture(mail) => lock(&mail.sent).clone(),
            _ => Vec::new(),
        }
    }

    /// Make the capturing backend reject these recipients.
    pub fn set_failing_recipients(&self, recipients: impl IntoIterator<Item = String>) {
        if let EmailBackend::Capture(mail) = &self.backend {
            let mut guard = lock(&mail.failing_recipients);
            guard.clear();
            guard.extend(recipients);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─── Templates ───────────────────────────────────────────────

/// Invitation with a redemption link.
pub fn invitation_email(
    to: &str,
    document_id: &str,
    url: &str,
    expires_at: DateTime<Utc>,
) -> OutgoingEmail {
    let title = escape_html(&document_title(document_id));
    OutgoingEmail {
        to: vec![to.to_string()],
        subject: format!("You've been invited to view {}", document_title(document_id)),
        html: format!(
            "<p>You have been given access to <strong>{title}</strong>.</p>\
             <p><a href=\"{url}\">Open the document</a></p>\
             <p>Sign in or create an account with <strong>{to}</strong> to use this link. \
             It can be used once and expires on {expires}.</p>",
            title = title,
            url = escape_html(url),
            to = escape_html(to),
            expires = email_timestamp(expires_at),
        ),
    }
}

/// Notice to admins that a new account was created.
pub fn signup_notification(
    admin_emails: &[String],
    user_id: &str,
    name: &str,
    emails: &[String],
    granted: &[String],
) -> OutgoingEmail {
    let granted_html = if granted.is_empty() {
        "<p>No documents were granted automatically.</p>".to_string()
    } else {
        format!(
            "<p>Granted automatically: {}</p>",
            escape_html(&granted.join(", "))
        )
    };

    OutgoingEmail {
        to: admin_emails.to_vec(),
        subject: format!("New signup: {}", name),
        html: format!(
            "<p><strong>{name}</strong> ({emails}) just created an account.</p>\
             <p>User id: <code>{user_id}</code></p>{granted}",
            name = escape_html(name),
            emails = escape_html(&emails.join(", ")),
            user_id = escape_html(user_id),
            granted = granted_html,
        ),
    }
}

/// Request from a signed-in user for access to a document.
pub fn access_request_email(
    admin_emails: &[String],
    requester: &UserIdentity,
    document_id: &str,
    message: Option<&str>,
) -> OutgoingEmail {
    let message_html = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| format!("<blockquote>{}</blockquote>", escape_html(m)))
        .unwrap_or_default();

    OutgoingEmail {
        to: admin_emails.to_vec(),
        subject: format!(
            "Access request: {} for {}",
            requester.display_name(),
            document_title(document_id)
        ),
        html: format!(
            "<p><strong>{name}</strong> ({email}) requested access to \
             <strong>{document}</strong> (<code>{document_id}</code>).</p>{message}\
             <p>User id: <code>{user_id}</code></p>",
            name = escape_html(&requester.display_name()),
            email = escape_html(&requester.primary_email().unwrap_or_default()),
            document = escape_html(&document_title(document_id)),
            document_id = escape_html(document_id),
            message = message_html,
            user_id = escape_html(&requester.id),
        ),
    }
}

/// Diagnostic message for the admin test endpoint.
pub fn test_email(to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: vec![to.to_string()],
        subject: "Email delivery test".to_string(),
        html: format!(
            "<p>This is a test message sent at {}.</p>",
            email_timestamp(Utc::now())
        ),
    }
}

/// `salmon-ai-genomics` -> `Salmon Ai Genomics`.
pub fn document_title(document_id: &str) -> String {
    document_id
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_title() {
        assert_eq!(document_title("salmon-ai-genomics"), "Salmon Ai Genomics");
        assert_eq!(
            document_title("health_tech-market-2024"),
            "Health Tech Market 2024"
        );
    }

    #[test]
    fn test_signup_notification_escapes_user_input() {
        let email = signup_notification(
            &["admin@firm.com".to_string()],
            "user_1",
            "<script>alert(1)</script>",
            &["x@y.com".to_string()],
            &[],
        );
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_capture_backend_records_and_fails() {
        let service = EmailService::capturing("Docs <docs@firm.com>");
        service.set_failing_recipients(["bad@x.com".to_string()]);

        let ok = service.send(&test_email("good@x.com")).await.unwrap();
        assert_eq!(ok, SendOutcome::Sent(None));

        let err = service.send(&test_email("bad@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Email(_)));

        let captured = service.captured();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].to, vec!["good@x.com"]);
    }

    #[tokio::test]
    async fn test_disabled_backend_skips() {
        let service = EmailService::new(None, "docs@firm.com").unwrap();
        assert!(!service.is_enabled());
        let outcome = service.send(&test_email("a@x.com")).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped);
    }
}
