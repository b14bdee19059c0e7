// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin authorization middleware.
//!
//! Runs after [`require_auth`](crate::middleware::auth::require_auth) and
//! re-reads the caller's admin flag from the identity store on every request,
//! so revoking the flag takes effect immediately.

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires an admin-flagged caller.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;

    if !state.directory.is_admin(&user.user_id).await? {
        tracing::warn!(
            user_id = %user.user_id,
            path = %request.uri().path(),
            "Non-admin caller rejected"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
