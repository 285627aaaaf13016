//! Account lifecycle over HTTP: registration, email verification, sessions.

mod common;

use axum::http::Method;
use common::{cookie_pair, response_json, TestApp, TEST_PASSWORD};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use shopfront_api::auth::{otp, user, UserRole};

fn verification_token(html: &str) -> String {
    let start = html.find("/verify-email/").expect("verify link") + "/verify-email/".len();
    html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[tokio::test]
async fn register_verify_and_login() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "name": "Asha Rao",
                "email": "Asha@Example.com",
                "password": TEST_PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["user"]["email"], "asha@example.com");
    assert_eq!(body["user"]["isVerified"], false);
    assert!(body["user"].get("password_hash").is_none());

    // unverified accounts cannot sign in
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login/email",
            Some(json!({ "email": "asha@example.com", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);

    let emails = app.outbox.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, "asha@example.com");
    let token = verification_token(&emails[0].html);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/auth/verify-email/{token}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    // the link is single use
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/auth/verify-email/{token}"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login/email",
            Some(json!({ "email": "asha@example.com", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let session_cookie = cookie_pair(&response, "token").expect("session cookie");
    let body = response_json(response).await;
    let access = body["token"].as_str().expect("access token").to_string();
    assert!(body["refresh_token"].is_string());
    assert_eq!(session_cookie, format!("token={access}"));

    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&access))
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["user"]["name"], "Asha Rao");
    assert_eq!(body["user"]["isVerified"], true);

    // the cookie alone is enough
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/auth/check",
            None,
            None,
            &[("cookie", session_cookie.as_str())],
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new().await;
    app.create_user("taken@example.com", UserRole::User).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "name": "Someone Else",
                "email": "taken@example.com",
                "password": TEST_PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn weak_passwords_fail_validation() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "name": "Weak", "email": "weak@example.com", "password": "password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    assert!(app.outbox.emails().is_empty());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.create_user("shopper@example.com", UserRole::User).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login/email",
            Some(json!({ "email": "shopper@example.com", "password": "Wr0ng!Pass" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["timestamp"].is_string());

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;

    let response = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 200);
    let cleared = cookie_pair(&response, "token").expect("cleared cookie");
    assert_eq!(cleared, "token=");

    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&shopper.token))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;

    let response = app
        .request(
            Method::PATCH,
            "/api/v1/auth/change-password",
            Some(json!({ "currentPassword": "Wr0ng!Pass", "newPassword": "N3w!Secret" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .request(
            Method::PATCH,
            "/api/v1/auth/change-password",
            Some(json!({ "currentPassword": TEST_PASSWORD, "newPassword": "N3w!Secret" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login/email",
            Some(json!({ "email": shopper.user.email, "password": "N3w!Secret" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
}

fn otp_code(body: &str) -> String {
    body.rsplit(' ').next().expect("otp in sms").to_string()
}

async fn request_otp(app: &TestApp, phone: &str) -> String {
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/phone-auth/request",
            Some(json!({ "phone": phone })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let sms = app.outbox.sms();
    let last = sms.last().expect("otp sms sent");
    assert_eq!(last.to, "+919876543210");
    otp_code(&last.body)
}

#[tokio::test]
async fn phone_login_accepts_a_fresh_code_once() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let mut active: user::ActiveModel = shopper.user.clone().into();
    active.phone = Set(Some("+919876543210".to_string()));
    active.update(&*app.state.db).await.expect("set phone");

    // formatting is stripped before lookup
    let code = request_otp(&app, "+91 98765-43210").await;
    assert_eq!(code.len(), 6);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/phone-auth/verify",
            Some(json!({ "phone": "+919876543210", "otp": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["_id"], json!(shopper.user.id));
    assert_eq!(body["user"]["phone"], "+919876543210");

    // consumed on success
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/phone-auth/verify",
            Some(json!({ "phone": "+919876543210", "otp": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn expired_phone_codes_are_rejected() {
    let app = TestApp::new().await;
    let shopper = app.customer().await;
    let mut active: user::ActiveModel = shopper.user.clone().into();
    active.phone = Set(Some("+919876543210".to_string()));
    active.update(&*app.state.db).await.expect("set phone");

    let code = request_otp(&app, "+919876543210").await;

    let issued = otp::Entity::find()
        .filter(otp::Column::UserId.eq(shopper.user.id))
        .all(&*app.state.db)
        .await
        .expect("otp rows");
    assert_eq!(issued.len(), 1);
    for row in issued {
        let mut stale: otp::ActiveModel = row.into();
        stale.expires_at = Set(Utc::now() - Duration::minutes(1));
        stale.update(&*app.state.db).await.expect("expire otp");
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/phone-auth/verify",
            Some(json!({ "phone": "+919876543210", "otp": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Invalid or expired OTP");
}
