mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;

#[tokio::test]
async fn health_check_returns_200() {
    let app = TestApp::spawn();

    let res = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["service"], "board-access-service-test");
    assert_eq!(res.body["checks"]["store"], "in_memory");
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn();

    let generated = app.request(Method::GET, "/health", None, None).await;
    assert!(generated.headers.contains_key("x-request-id"));
    assert_eq!(
        generated.headers.get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let echoed = app
        .request_with_headers(
            Method::GET,
            "/health",
            None,
            None,
            &[("x-request-id", "req-123")],
        )
        .await;
    assert_eq!(echoed.headers.get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let app = TestApp::spawn();

    let res = app
        .request(Method::GET, "/.well-known/openapi.json", None, None)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let paths = res.body["paths"].as_object().unwrap();
    for path in [
        "/customer-auth",
        "/invitations/{token}",
        "/boards/{board_id}/invitations",
        "/portal/{organization}/{board_slug}",
        "/customers/me",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
    assert!(res.body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn metrics_without_recorder_is_empty() {
    let app = TestApp::spawn();

    let res = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
}
