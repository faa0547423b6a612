mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_returns_token_that_verifies() {
    let app = TestApp::spawn();

    let res = app
        .action(json!({
            "action": "register",
            "email": "  Ada@Example.com ",
            "password": PASSWORD,
            "first_name": "Ada",
            "company": "Acme",
        }))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.get("error").is_none());
    assert_eq!(res.body["user"]["email"], "ada@example.com");
    assert_eq!(res.body["user"]["first_name"], "Ada");
    assert_eq!(res.body["user"]["last_name"], "");
    let token = res.body["token"].as_str().unwrap().to_string();

    let verify = app
        .action(json!({ "action": "verify-token", "token": token }))
        .await;
    assert_eq!(verify.status, StatusCode::OK);
    assert_eq!(verify.body["user"]["email"], "ada@example.com");
    assert!(verify.body.get("token").is_none());
}

#[tokio::test]
async fn duplicate_email_in_any_case_is_rejected() {
    let app = TestApp::spawn();
    app.register("dup@example.com").await;

    let res = app
        .action(json!({
            "action": "register",
            "email": "DUP@Example.COM",
            "password": PASSWORD,
        }))
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["error"], "Email already registered");
    assert_eq!(app.store.customer_count().unwrap(), 1);
}

#[tokio::test]
async fn short_password_creates_nothing() {
    let app = TestApp::spawn();

    for password in ["", "a", "12345"] {
        let res = app
            .action(json!({
                "action": "register",
                "email": "weak@example.com",
                "password": password,
            }))
            .await;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(res.body["error"].as_str().unwrap().contains("at least 6"));
    }

    assert_eq!(app.store.customer_count().unwrap(), 0);
}

#[tokio::test]
async fn malformed_email_is_rejected_at_registration() {
    let app = TestApp::spawn();

    let res = app
        .action(json!({
            "action": "register",
            "email": "not-an-email",
            "password": PASSWORD,
        }))
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.store.customer_count().unwrap(), 0);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::spawn();
    app.register("known@example.com").await;

    let ok = app
        .action(json!({
            "action": "login",
            "email": "KNOWN@example.com",
            "password": PASSWORD,
        }))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(ok.body["token"].is_string());

    let wrong_password = app
        .action(json!({
            "action": "login",
            "email": "known@example.com",
            "password": "wrong-password",
        }))
        .await;
    let unknown_email = app
        .action(json!({
            "action": "login",
            "email": "nobody@example.com",
            "password": PASSWORD,
        }))
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, wrong_password.status);
    assert_eq!(unknown_email.body, wrong_password.body);
    assert_eq!(wrong_password.body["error"], "Invalid email or password");
}

#[tokio::test]
async fn logout_revokes_only_that_session_and_is_idempotent() {
    let app = TestApp::spawn();
    let (first, _) = app.register("multi@example.com").await;

    let second = app
        .action(json!({
            "action": "login",
            "email": "multi@example.com",
            "password": PASSWORD,
        }))
        .await
        .body["token"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..2 {
        let res = app
            .action(json!({ "action": "logout", "token": first }))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.get("error").is_none());
    }

    let revoked = app
        .action(json!({ "action": "verify-token", "token": first }))
        .await;
    assert_eq!(revoked.status, StatusCode::UNAUTHORIZED);
    assert!(revoked.body.get("user").is_none());

    let still_valid = app
        .action(json!({ "action": "verify-token", "token": second }))
        .await;
    assert_eq!(still_valid.status, StatusCode::OK);
}

#[tokio::test]
async fn garbage_tokens_are_invalid_not_errors() {
    let app = TestApp::spawn();

    for token in ["", "short", "../../etc/passwd"] {
        let res = app
            .action(json!({ "action": "verify-token", "token": token }))
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let logout = app.action(json!({ "action": "logout", "token": token })).await;
        assert_eq!(logout.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn unknown_action_and_missing_fields_are_bad_requests() {
    let app = TestApp::spawn();

    let unknown = app.action(json!({ "action": "delete-everything" })).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert!(unknown.body["error"].is_string());

    let missing = app
        .action(json!({ "action": "login", "email": "a@x.com" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let no_tag = app.action(json!({ "email": "a@x.com" })).await;
    assert_eq!(no_tag.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_outage_surfaces_as_retryable_failure() {
    let app = TestApp::spawn();
    let (token, _) = app.register("outage@example.com").await;

    // One failure is absorbed by the read retry.
    app.store.fail_next(1);
    let retried = app
        .action(json!({ "action": "verify-token", "token": token }))
        .await;
    assert_eq!(retried.status, StatusCode::OK);

    app.store.fail_next(2);
    let res = app
        .action(json!({ "action": "verify-token", "token": token }))
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.headers.get("retry-after").and_then(|v| v.to_str().ok()),
        Some("1")
    );
    assert!(res.body["error"].is_string());
}

#[tokio::test]
async fn customer_auth_is_rate_limited_per_ip() {
    let app = TestApp::with_auth_limit(2);
    let body = json!({ "action": "verify-token", "token": "x" });

    for _ in 0..2 {
        let res = app
            .request_with_headers(
                Method::POST,
                "/customer-auth",
                None,
                Some(body.clone()),
                &[("x-forwarded-for", "203.0.113.9")],
            )
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let limited = app
        .request_with_headers(
            Method::POST,
            "/customer-auth",
            None,
            Some(body.clone()),
            &[("x-forwarded-for", "203.0.113.9")],
        )
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers.contains_key("retry-after"));

    let other_ip = app
        .request_with_headers(
            Method::POST,
            "/customer-auth",
            None,
            Some(body),
            &[("x-forwarded-for", "198.51.100.7")],
        )
        .await;
    assert_eq!(other_ip.status, StatusCode::UNAUTHORIZED);
}
