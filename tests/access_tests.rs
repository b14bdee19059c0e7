// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access queries and access requests for signed-in users.

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, json_request, seed_user, session_for};

#[tokio::test]
async fn test_access_check_follows_grants() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    state
        .grants
        .grant("user_1", &["doc-a".to_string()])
        .await
        .unwrap();
    let token = session_for(&state, "user_1");

    for (document_id, expected) in [("doc-a", true), ("doc-b", false)] {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/document-access",
                Some(&token),
                Some(json!({ "documentId": document_id })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "hasAccess": expected }));
    }

    let response = app
        .oneshot(json_request(Method::GET, "/api/documents", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({ "documentIds": ["doc-a"] }));
}

#[tokio::test]
async fn test_access_check_rejects_bad_input() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = session_for(&state, "user_1");

    for body in [json!({}), json!({ "documentId": "UPPER" }), json!({ "documentId": 7 })] {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/document-access",
                Some(&token),
                Some(body.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_access_request_notifies_admins() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = session_for(&state, "user_1");

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/document-access/request",
            Some(&token),
            Some(json!({ "documentId": "salmon-ai-genomics", "message": "For the <board> meeting" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await, json!({ "requested": true }));

    let sent = state.email.captured();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["admin@firm.com"]);
    assert!(sent[0].html.contains("one@x.com"));
    assert!(sent[0].html.contains("&lt;board&gt;"));

    // Requesting never grants
    assert!(!state
        .grants
        .has_access("user_1", "salmon-ai-genomics")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_access_request_when_already_granted() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    state
        .grants
        .grant("user_1", &["doc-a".to_string()])
        .await
        .unwrap();
    let token = session_for(&state, "user_1");

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/document-access/request",
            Some(&token),
            Some(json!({ "documentId": "doc-a" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "requested": false }));
    assert!(state.email.captured().is_empty());
}

#[tokio::test]
async fn test_access_request_message_length_limit() {
    let (app, state) = create_test_app().await;
    seed_user(&state, "user_1", &["one@x.com"]).await;
    let token = session_for(&state, "user_1");

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/document-access/request",
            Some(&token),
            Some(json!({ "documentId": "doc-a", "message": "x".repeat(2001) })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.email.captured().is_empty());
}
