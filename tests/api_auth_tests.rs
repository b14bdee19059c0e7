// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, authorization and CORS tests.
//!
//! These tests verify that:
//! 1. Session routes reject requests without valid tokens
//! 2. Admin routes reject signed-in non-admins
//! 3. The session cookie is accepted as well as the bearer header
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, json_request, seed_user, session_for, ADMIN_ID};

/// Create a session token with an arbitrary lifetime.
fn create_test_jwt(user_id: &str, signing_key: &[u8], lifetime_secs: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + lifetime_secs) as usize,
        iat: now as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(json_request(Method::GET, "/api/documents", None, None))
        .await
        .unwrap();

    // Should return 401 Unauthorized without token
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/documents",
            Some("invalid.token.here"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = create_test_jwt("user_1", &state.config.session_signing_key, -3600);

    let response = app
        .oneshot(json_request(Method::GET, "/api/documents", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = session_for(&state, "user_1");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/documents")
                .header(header::COOKIE, format!("__session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "documentIds": [] }));
}

#[tokio::test]
async fn test_admin_check_for_both_roles() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;

    for (user_id, expected) in [(ADMIN_ID, true), ("user_1", false)] {
        let token = session_for(&state, user_id);
        let response = app
            .clone()
            .oneshot(json_request(
                Method::GET,
                "/api/admin/check",
                Some(&token),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "isAdmin": expected }));
    }
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_non_admin() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = session_for(&state, "user_1");

    let requests = [
        json_request(
            Method::GET,
            "/api/admin/approved-emails?documentId=doc",
            Some(&token),
            None,
        ),
        json_request(
            Method::POST,
            "/api/admin/approved-emails",
            Some(&token),
            Some(json!({ "documentId": "doc", "emails": ["one@x.com"] })),
        ),
        json_request(Method::GET, "/api/admin/magic-links", Some(&token), None),
        json_request(
            Method::POST,
            "/api/admin/update-access",
            Some(&token),
            Some(json!({ "userId": "user_1", "documentId": "doc", "action": "grant" })),
        ),
        json_request(Method::GET, "/api/admin/users", Some(&token), None),
    ];

    for request in requests {
        let uri = request.uri().clone();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }

    // The forbidden grant attempt changed nothing
    assert!(!state.grants.has_access("user_1", "doc").await.unwrap());
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(json_request(Method::GET, "/api/admin/users", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/document-access")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    // Should have CORS headers
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_cors_rejects_lookalike_origins() {
    let (app, _) = create_test_app().await;

    for origin in ["http://localhost.attacker.example", "http://127.0.0.1.evil.net"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/admin/users")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "{}",
            origin
        );
    }
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let (app, _) = create_test_app().await;

    let response = app
        .oneshot(json_request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    // Health should be accessible without auth
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}
