// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use docgate::config::Config;
use docgate::db::IdentityDb;
use docgate::middleware::auth::create_session_token;
use docgate::models::UserIdentity;
use docgate::routes::create_router;
use docgate::services::signature::{
    WebhookVerifier, ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use docgate::services::EmailService;
use docgate::AppState;
use serde_json::Value;
use std::sync::Arc;

/// Id of the admin seeded into every test app.
#[allow(dead_code)]
pub const ADMIN_ID: &str = "user_admin";

/// Create a test app over an in-memory identity store and a capturing
/// mailer, seeded with one admin account.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(EmailService::capturing("Docs <docs@firm.com>")).await
}

#[allow(dead_code)]
pub async fn create_test_app_with(email: EmailService) -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db = IdentityDb::new_memory();
    db.insert_user(UserIdentity::new(ADMIN_ID, ["admin@firm.com"]).with_admin_flag())
        .await
        .unwrap();

    let state = AppState::new(config, db, email).unwrap();
    (create_router(state.clone()), state)
}

/// Add a plain user with the given verified addresses.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, id: &str, emails: &[&str]) {
    state
        .db
        .insert_user(UserIdentity::new(id, emails.iter().copied()))
        .await
        .unwrap();
}

/// Session token for `user_id`, signed with the test key.
#[allow(dead_code)]
pub fn session_for(state: &AppState, user_id: &str) -> String {
    create_session_token(user_id, &state.config.session_signing_key).unwrap()
}

/// Build a JSON request, optionally authenticated with a bearer session.
#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Signed signup webhook delivery.
#[allow(dead_code)]
pub fn signed_webhook(state: &AppState, body: &Value) -> Request<Body> {
    let verifier = WebhookVerifier::new(&state.config.webhook_signing_secret).unwrap();
    let body = body.to_string();
    let timestamp = chrono::Utc::now().timestamp();
    let signature = verifier.sign("msg_test", timestamp, body.as_bytes()).unwrap();

    Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/identity")
        .header(header::CONTENT_TYPE, "application/json")
        .header(ID_HEADER, "msg_test")
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
