// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: approval lists, invitations, manual overrides and
//! diagnostics.

use crate::config::DEFAULT_INVITATION_EXPIRY_DAYS;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AuditEntry, UserIdentity};
use crate::routes::validated;
use crate::services::email::{test_email, SendOutcome};
use crate::services::invitations::MAX_EXPIRY_DAYS;
use crate::services::{AccessAction, ApprovalUpdate, InvitationResult, InvitationView};
use crate::validation::{normalize_email, validate_document_id};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Admin routes (require a session and the admin flag).
/// Both middlewares are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/approved-emails",
            get(get_approved_emails).post(set_approved_emails),
        )
        .route(
            "/api/admin/magic-links",
            get(list_invitations)
                .post(create_invitations)
                .delete(delete_invitation),
        )
        .route("/api/admin/update-access", post(update_access))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/audit-log", get(audit_log))
        .route("/api/admin/test-email", post(send_test_email))
}

/// Routes any signed-in user may call.
pub fn check_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/check", get(check_admin))
}

// ─── Admin check ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

/// Whether the caller is an admin.
async fn check_admin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AdminCheckResponse>> {
    let is_admin = state.directory.is_admin(&user.user_id).await?;
    Ok(Json(AdminCheckResponse { is_admin }))
}

// ─── Approval lists ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct DocumentQuery {
    #[validate(custom(function = "validate_document_id"))]
    document_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApprovedEmailsResponse {
    pub document_id: String,
    pub approved_emails: Vec<String>,
}

async fn get_approved_emails(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DocumentQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<ApprovedEmailsResponse>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    query.validate()?;

    let approved_emails = state.approvals.approved_emails(&query.document_id).await?;
    Ok(Json(ApprovedEmailsResponse {
        document_id: query.document_id,
        approved_emails,
    }))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SetApprovalsRequest {
    #[validate(custom(function = "validate_document_id"))]
    document_id: String,
    emails: Vec<String>,
}

async fn set_approved_emails(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<SetApprovalsRequest>, JsonRejection>,
) -> Result<Json<ApprovalUpdate>> {
    let request = validated(payload)?;
    tracing::info!(
        admin_id = %admin.user_id,
        document_id = %request.document_id,
        count = request.emails.len(),
        "Saving approval list"
    );

    let update = state
        .approvals
        .set_approved_emails(&request.document_id, request.emails.as_slice())
        .await?;
    Ok(Json(update))
}

// ─── Invitations ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationListResponse {
    pub invitations: Vec<InvitationView>,
}

async fn list_invitations(State(state): State<Arc<AppState>>) -> Result<Json<InvitationListResponse>> {
    let invitations = state.invitations.list().await?;
    Ok(Json(InvitationListResponse { invitations }))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateInvitationsRequest {
    #[validate(custom(function = "validate_document_id"))]
    document_id: String,
    #[validate(length(min = 1))]
    emails: Vec<String>,
    #[validate(range(min = 1, max = MAX_EXPIRY_DAYS))]
    expires_in_days: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationsResponse {
    pub results: Vec<InvitationResult>,
    pub created: usize,
    pub failed: usize,
}

async fn create_invitations(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<CreateInvitationsRequest>, JsonRejection>,
) -> Result<Json<CreateInvitationsResponse>> {
    let request = validated(payload)?;
    let days = request
        .expires_in_days
        .unwrap_or(DEFAULT_INVITATION_EXPIRY_DAYS);

    let results = state
        .invitations
        .create(&request.document_id, request.emails.as_slice(), days, &admin.user_id)
        .await?;

    let created = results.iter().filter(|r| r.success).count();
    Ok(Json(CreateInvitationsResponse {
        failed: results.len() - created,
        created,
        results,
    }))
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

async fn delete_invitation(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<DeletedResponse>> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("token is required".to_string()))?;

    state.invitations.delete(token.trim()).await?;
    tracing::info!(admin_id = %admin.user_id, "Invitation deleted by admin");
    Ok(Json(DeletedResponse { deleted: true }))
}

// ─── Manual override ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateAccessRequest {
    #[validate(length(min = 1))]
    user_id: String,
    #[validate(custom(function = "validate_document_id"))]
    document_id: String,
    action: AccessAction,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpdateAccessResponse {
    pub user_id: String,
    pub document_access: Vec<String>,
}

async fn update_access(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateAccessRequest>, JsonRejection>,
) -> Result<Json<UpdateAccessResponse>> {
    let request = validated(payload)?;

    let documents = state
        .grants
        .update_access(
            &request.user_id,
            &request.document_id,
            request.action,
            &admin.user_id,
        )
        .await?;

    Ok(Json(UpdateAccessResponse {
        user_id: request.user_id,
        document_access: documents.into_iter().collect(),
    }))
}

// ─── Users ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub emails: Vec<String>,
    pub name: String,
    pub is_admin: bool,
    pub document_access: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<UserIdentity> for AdminUserView {
    fn from(user: UserIdentity) -> Self {
        Self {
            name: user.display_name(),
            is_admin: user.is_admin(),
            document_access: user.document_access().into_iter().collect(),
            id: user.id,
            emails: user.emails,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<AdminUserView>,
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<UsersResponse>> {
    let users = state
        .db
        .all_users()
        .await?
        .into_iter()
        .map(AdminUserView::from)
        .collect();
    Ok(Json(UsersResponse { users }))
}

// ─── Audit log ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
}

async fn audit_log(State(state): State<Arc<AppState>>) -> Result<Json<AuditLogResponse>> {
    let entries = state
        .ledger
        .read()
        .await?
        .map(|ledger| ledger.recent_audit())
        .unwrap_or_default();
    Ok(Json(AuditLogResponse { entries }))
}

// ─── Email diagnostics ───────────────────────────────────────

#[derive(Deserialize)]
struct TestEmailRequest {
    to: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestEmailResponse {
    success: bool,
    email_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Send a test message. Provider errors are returned verbatim.
async fn send_test_email(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TestEmailRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let to = normalize_email(&request.to)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid email address: {}", request.to)))?;

    let email_enabled = state.email.is_enabled();
    let response = match state.email.send(&test_email(&to)).await {
        Ok(outcome) => {
            let message_id = match outcome {
                SendOutcome::Sent(id) => id,
                SendOutcome::Skipped => None,
            };
            (
                StatusCode::OK,
                Json(TestEmailResponse {
                    success: email_enabled,
                    email_enabled,
                    message_id,
                    error: (!email_enabled).then(|| "Email is not configured".to_string()),
                }),
            )
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(TestEmailResponse {
                success: false,
                email_enabled,
                message_id: None,
                error: Some(e.to_string()),
            }),
        ),
    };

    Ok(response.into_response())
}
