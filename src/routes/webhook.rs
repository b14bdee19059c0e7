// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for identity provider events.

use crate::db::clerk::ClerkUser;
use crate::error::{AppError, Result};
use crate::models::UserIdentity;
use crate::services::SignupEvent;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Event type that triggers signup reconciliation.
const USER_CREATED: &str = "user.created";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/identity", post(handle_event))
}

/// Webhook envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    received: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    granted: Vec<String>,
}

/// Verify and dispatch an event.
///
/// Errors during reconciliation are returned as non-2xx so the provider
/// retries; every step is idempotent.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    if let Err(e) = state.webhook_verifier.verify(&headers, &body) {
        tracing::warn!(error = %e, "Security Alert: Webhook signature rejected");
        let status = if e.is_malformed() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::UNAUTHORIZED
        };
        return Ok((status, Json(serde_json::json!({ "error": e.to_string() }))).into_response());
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

    if event.event_type != USER_CREATED {
        tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
        return Ok(Json(WebhookResponse {
            received: true,
            granted: Vec::new(),
        })
        .into_response());
    }

    // Same shape as the provider's user resource; unverified addresses drop out
    let user: ClerkUser = serde_json::from_value(event.data)
        .map_err(|e| AppError::BadRequest(format!("Invalid user.created payload: {}", e)))?;
    let signup = SignupEvent::from(UserIdentity::from(user));
    tracing::info!(user_id = %signup.user_id, "Processing signup webhook");

    let outcome = state.signup.handle_signup(&signup).await?;

    Ok(Json(WebhookResponse {
        received: true,
        granted: outcome.granted,
    })
    .into_response())
}
