//! Minting and verifying editor links.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, post_json, TestApp};
use navlens_core::activation::EditorLink;
use navlens_core::editor_token::hash_editor_token;
use serde_json::{json, Value};

const PAGE_URL: &str = "https://shop.example.com/pricing?utm_source=mail";

async fn mint(app: &TestApp, user: Option<&str>, experiment_id: &str, variant_id: &str) -> (StatusCode, Value) {
    let cookie = user.map(|u| app.session_cookie(u));
    let response = post_json(
        app,
        &format!("/api/v1/experiments/{experiment_id}/editor-link"),
        json!({ "variantId": variant_id, "pageUrl": PAGE_URL }),
        cookie.as_deref(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

fn verify_body(link: &EditorLink, site_id: &str) -> Value {
    json!({
        "experimentId": link.experiment_id,
        "siteId": site_id,
        "variantId": link.variant_id,
        "timestamp": link.timestamp,
        "signature": link.signature,
        "token": link.token,
    })
}

async fn verify(app: &TestApp, body: Value) -> (StatusCode, Value) {
    let response = post_json(app, "/api/v1/editor/verify", body, None).await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Minting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_owner_mints_link_that_verifies() {
    let app = build_test_app();
    let (status, json) = mint(&app, Some("alice"), "exp-1", "var-1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["expiresAt"].is_string());

    let url = json["data"]["url"].as_str().unwrap();
    assert!(url.starts_with("https://shop.example.com/pricing?utm_source=mail&"));
    let link = EditorLink::from_url(url).unwrap();
    assert_eq!(link.experiment_id, "exp-1");
    assert_eq!(link.variant_id, "var-1");

    let stored = app.store.tokens.lock().unwrap().clone();
    let record = stored.get(&hash_editor_token(&link.token)).expect("token stored by hash");
    assert!(!record.used);
    assert_eq!(record.user_id, "alice");

    let (status, json) = verify(&app, verify_body(&link, "site-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["valid"], true);
    assert_eq!(json["data"]["experimentId"], "exp-1");
    assert!(app.store.tokens.lock().unwrap()[&hash_editor_token(&link.token)].used);
}

#[tokio::test]
async fn test_reused_token_is_still_accepted() {
    let app = build_test_app();
    let (_, json) = mint(&app, Some("alice"), "exp-1", "var-1").await;
    let link = EditorLink::from_url(json["data"]["url"].as_str().unwrap()).unwrap();

    let (first, _) = verify(&app, verify_body(&link, "site-1")).await;
    let (second, _) = verify(&app, verify_body(&link, "site-1")).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
}

#[tokio::test]
async fn test_non_owner_cannot_mint() {
    let app = build_test_app();
    let (status, json) = mint(&app, Some("bob"), "exp-1", "var-1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_mint_requires_session() {
    let app = build_test_app();
    let (status, json) = mint(&app, None, "exp-1", "var-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_mint_unknown_experiment_or_foreign_variant_is_not_found() {
    let app = build_test_app();
    let (status, _) = mint(&app, Some("alice"), "exp-404", "var-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = mint(&app, Some("alice"), "exp-1", "var-2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mint_rejects_invalid_page_url() {
    let app = build_test_app();
    let response = post_json(
        &app,
        "/api/v1/experiments/exp-1/editor-link",
        json!({ "variantId": "var-1", "pageUrl": "not a url" }),
        Some(&app.session_cookie("alice")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_verify_rejects_unknown_token() {
    let app = build_test_app();
    let (_, json) = mint(&app, Some("alice"), "exp-1", "var-1").await;
    let mut link = EditorLink::from_url(json["data"]["url"].as_str().unwrap()).unwrap();
    link.token = "forged".into();

    let (status, json) = verify(&app, verify_body(&link, "site-1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid signature");
}

#[tokio::test]
async fn test_verify_rejects_wrong_site() {
    let app = build_test_app();
    let (_, json) = mint(&app, Some("alice"), "exp-1", "var-1").await;
    let link = EditorLink::from_url(json["data"]["url"].as_str().unwrap()).unwrap();

    let (status, json) = verify(&app, verify_body(&link, "site-2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Not authorized for this experiment");
}

#[tokio::test]
async fn test_verify_requires_token() {
    let app = build_test_app();
    let (_, json) = mint(&app, Some("alice"), "exp-1", "var-1").await;
    let link = EditorLink::from_url(json["data"]["url"].as_str().unwrap()).unwrap();
    let mut body = verify_body(&link, "site-1");
    body.as_object_mut().unwrap().remove("token");

    let (status, json) = verify(&app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
