//! Shared setup for board-access-service integration tests.
//!
//! Every test drives the full router with `oneshot` against a fresh
//! in-memory store, so no database is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use board_access_service::{
    build_router,
    models::{AccessType, BoardRole, CustomerBoard},
    services::{InMemoryStore, SessionSettings, StorePolicy},
    AppState, ServiceSettings,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret1";
pub const ORGANIZATION: &str = "acme";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn test_settings() -> ServiceSettings {
    ServiceSettings {
        service_name: "board-access-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        environment: "Dev".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        swagger_enabled: false,
        invitation_ttl: chrono::Duration::hours(24),
        public_base_url: "https://feedback.test".to_string(),
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_auth_limit(1_000)
    }

    pub fn with_auth_limit(auth_attempts: u32) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::from_store(
            store.clone(),
            test_settings(),
            StorePolicy::new(Duration::from_millis(500), Duration::from_millis(1)),
            SessionSettings::default(),
            create_ip_rate_limiter(auth_attempts, 60),
            create_ip_rate_limiter(10_000, 60),
        );
        let router = build_router(state.clone());
        Self {
            router,
            store,
            state,
        }
    }

    pub fn seed_board(&self, board_slug: &str, is_public: bool, access_type: AccessType) -> Uuid {
        let board_id = Uuid::new_v4();
        self.store
            .insert_board(CustomerBoard {
                board_id,
                organization_slug: ORGANIZATION.to_string(),
                board_slug: board_slug.to_string(),
                board_name: format!("{} board", board_slug),
                is_public,
                access_type,
            })
            .expect("Failed to seed board");
        board_id
    }

    pub fn grant(&self, board_id: Uuid, customer_id: Uuid, role: BoardRole) {
        self.store
            .grant_membership(board_id, customer_id, role)
            .expect("Failed to grant membership");
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn action(&self, body: Value) -> TestResponse {
        self.request(Method::POST, "/customer-auth", None, Some(body))
            .await
    }

    /// Register `email` and return its session token and customer id.
    pub async fn register(&self, email: &str) -> (String, Uuid) {
        let res = self
            .action(json!({
                "action": "register",
                "email": email,
                "password": PASSWORD,
            }))
            .await;
        assert_eq!(res.status, StatusCode::OK, "register failed: {}", res.body);
        let token = res.body["token"]
            .as_str()
            .expect("token missing")
            .to_string();
        let customer_id = res.body["user"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("user id missing");
        (token, customer_id)
    }

    /// Register an admin of `board_id` and return their session token.
    pub async fn board_admin(&self, board_id: Uuid, email: &str) -> String {
        let (token, customer_id) = self.register(email).await;
        self.grant(board_id, customer_id, BoardRole::Admin);
        token
    }

    /// Issue an invitation through the HTTP surface and return its token.
    pub async fn invite(
        &self,
        board_id: Uuid,
        admin_token: &str,
        email: &str,
        role: &str,
    ) -> String {
        let res = self
            .request(
                Method::POST,
                &format!("/boards/{}/invitations", board_id),
                Some(admin_token),
                Some(json!({ "email": email, "role": role })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "invite failed: {}", res.body);
        res.body["invite_token"]
            .as_str()
            .expect("invite_token missing")
            .to_string()
    }
}
