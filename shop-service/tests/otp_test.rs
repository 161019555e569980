mod common;

use axum::http::StatusCode;
use common::{test_config, TestApp};
use serde_json::json;
use shop_service::services::otp::extract_code;

const OWNER: &str = "owner@example.com";

fn secured_app() -> TestApp {
    TestApp::with_config(test_config(true))
}

async fn request_code(app: &TestApp, email: &str) -> (String, String) {
    let response = app.post("/api/auth/otp/send", json!({ "email": email })).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["expires_in"], 300);

    let otp_id = body["otp_id"].as_str().unwrap().to_string();
    let mail = app.email.last_sent_to(email).expect("No login email sent");
    let code = extract_code(&mail.body_text).expect("No code in login email");
    (otp_id, code)
}

#[tokio::test]
async fn shop_routes_require_a_token_when_auth_is_on() {
    let app = secured_app();

    let response = app.get("/api/items").await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["success"], false);
}

#[tokio::test]
async fn health_stays_public_when_auth_is_on() {
    let app = secured_app();
    assert_eq!(app.get("/health").await.status, StatusCode::OK);
}

#[tokio::test]
async fn otp_login_unlocks_shop_routes() {
    let mut app = secured_app();
    let (otp_id, code) = request_code(&app, OWNER).await;

    let response = app
        .post("/api/auth/otp/verify", json!({ "otp_id": otp_id, "code": code }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 15 * 60);

    app.token = Some(body["access_token"].as_str().unwrap().to_string());
    let items = app.get("/api/items").await;
    assert_eq!(items.status, StatusCode::OK);
}

#[tokio::test]
async fn code_cannot_be_reused() {
    let app = secured_app();
    let (otp_id, code) = request_code(&app, OWNER).await;
    let body = json!({ "otp_id": otp_id, "code": code });

    assert_eq!(app.post("/api/auth/otp/verify", body.clone()).await.status, StatusCode::OK);
    assert_eq!(
        app.post("/api/auth/otp/verify", body).await.status,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn wrong_code_is_rejected() {
    let app = secured_app();
    let (otp_id, code) = request_code(&app, OWNER).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let response = app
        .post("/api/auth/otp/verify", json!({ "otp_id": otp_id, "code": wrong }))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let mut app = secured_app();
    app.token = Some("not-a-jwt".to_string());

    assert_eq!(app.get("/api/invoices").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sends_are_rate_limited_per_address() {
    let app = secured_app();
    for _ in 0..3 {
        request_code(&app, OWNER).await;
    }

    let response = app.post("/api/auth/otp/send", json!({ "email": OWNER })).await;

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers["retry-after"], "900");
    assert_eq!(app.email.send_count(), 3);
}

#[tokio::test]
async fn malformed_requests_fail_validation() {
    let app = secured_app();

    let bad_email = app.post("/api/auth/otp/send", json!({ "email": "nope" })).await;
    assert_eq!(bad_email.status, StatusCode::UNPROCESSABLE_ENTITY);

    let short_code = app
        .post("/api/auth/otp/verify", json!({ "otp_id": "abc", "code": "12" }))
        .await;
    assert_eq!(short_code.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn operator_allowlist_is_enforced() {
    let mut config = test_config(true);
    config.auth.operator_emails = vec![OWNER.to_string()];
    let app = TestApp::with_config(config);

    let response = app
        .post("/api/auth/otp/send", json!({ "email": "stranger@example.com" }))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(app.email.send_count(), 0);
}
