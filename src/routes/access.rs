// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access routes for signed-in users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::routes::validated;
use crate::validation::validate_document_id;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Access routes (require a session).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/document-access", post(check_access))
        .route("/api/document-access/request", post(request_access))
        .route("/api/documents", get(list_documents))
}

// ─── Access check ────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AccessQuery {
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
pub struct AccessResponse {
    pub has_access: bool,
}

/// Whether the caller may view a document.
async fn check_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<AccessQuery>, JsonRejection>,
) -> Result<Json<AccessResponse>> {
    let query = validated(payload)?;
    let has_access = state
        .grants
        .has_access(&user.user_id, &query.document_id)
        .await?;

    Ok(Json(AccessResponse { has_access }))
}

// ─── Granted documents ───────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DocumentsResponse {
    pub document_ids: Vec<String>,
}

/// Documents granted to the caller.
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DocumentsResponse>> {
    let document_ids = match state.grants.documents(&user.user_id).await {
        Ok(documents) => documents.into_iter().collect(),
        // Session for an account the store no longer has
        Err(AppError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    Ok(Json(DocumentsResponse { document_ids }))
}

// ─── Access requests ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AccessRequest {
    #[validate(custom(function = "validate_document_id"))]
    document_id: String,
    #[validate(length(max = 2000))]
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccessRequestResponse {
    pub requested: bool,
}

/// Ask the admins for access to a document. Delivery is best-effort.
async fn request_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<AccessRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccessRequestResponse>)> {
    let request = validated(payload)?;

    let requester = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if requester.document_access().contains(&request.document_id) {
        return Ok((
            StatusCode::OK,
            Json(AccessRequestResponse { requested: false }),
        ));
    }

    if let Err(e) = state
        .notifications
        .request_access(&requester, &request.document_id, request.message.as_deref())
        .await
    {
        tracing::warn!(
            user_id = %user.user_id,
            document_id = %request.document_id,
            error = %e,
            "Access request notification failed"
        );
    }

    tracing::info!(
        user_id = %user.user_id,
        document_id = %request.document_id,
        "Access requested"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(AccessRequestResponse { requested: true }),
    ))
}
