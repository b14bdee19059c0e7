// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Invitation redemption.
//!
//! Public route: visitors without a session get a `needs_authentication`
//! answer carrying a sign-in URL that leads back to the same link.

use crate::error::Result;
use crate::middleware::auth::MaybeAuthUser;
use crate::services::Redemption;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// Tokens are 43 characters; anything much longer is not ours.
const MAX_TOKEN_LEN: usize = 128;

/// Redemption routes (session optional).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/magic-link/{token}", get(redeem))
}

impl Redemption {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Redemption::Redeemed { .. } => StatusCode::OK,
            Redemption::NeedsAuthentication { .. } => StatusCode::UNAUTHORIZED,
            Redemption::EmailMismatch { .. } => StatusCode::FORBIDDEN,
            Redemption::Invalid => StatusCode::NOT_FOUND,
            Redemption::AlreadyUsed { .. } => StatusCode::CONFLICT,
            Redemption::Expired { .. } => StatusCode::GONE,
        }
    }
}

impl IntoResponse for Redemption {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Redeem an invitation token for the signed-in caller.
async fn redeem(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(token): Path<String>,
) -> Result<Redemption> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Ok(Redemption::Invalid);
    }

    let caller = user.as_ref().map(|u| u.user_id.as_str());
    let outcome = state.invitations.redeem(&token, caller).await?;

    tracing::info!(
        user_id = ?caller,
        status = outcome.status_code().as_u16(),
        "Invitation link visited"
    );
    Ok(outcome)
}
