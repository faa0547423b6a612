pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    extract::{MatchedPath, State},
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AccessConfig;
use crate::services::{
    AccessGate, BoardRegistry, CustomerStore, Database, InvitationManager, InvitationStore,
    MembershipStore, SessionManager, SessionSettings, SessionStore, StorePolicy,
};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::metrics::metrics,
        handlers::customer_auth::customer_auth,
        handlers::invitation::create_invitation,
        handlers::invitation::get_invitation,
        handlers::portal::portal_access,
        handlers::members::list_members,
        handlers::members::remove_member,
        handlers::customer::get_me,
        handlers::customer::update_me,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::customer_auth::CustomerAuthRequest,
            dtos::customer_auth::ActionResponse,
            dtos::customer_auth::MembershipView,
            dtos::invitation::CreateInvitationRequest,
            dtos::invitation::CreateInvitationResponse,
            dtos::invitation::InvitationDetailsResponse,
            dtos::access::PortalAccessResponse,
            dtos::access::MembersResponse,
            dtos::customer::UpdateProfileRequest,
            models::CustomerView,
            models::BoardRole,
            models::AccessRole,
            models::Capability,
            models::InvitationState,
            services::DenialReason,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Customer Authentication", description = "Sign-up, sign-in, sign-out and invitation acceptance"),
        (name = "Invitations", description = "Board invitation issue and preview"),
        (name = "Access", description = "Board access decisions"),
        (name = "Members", description = "Board membership administration"),
        (name = "Customer", description = "Customer profile"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("Opaque session token")
                        .build(),
                ),
            );
        }
    }
}

/// Settings the router and handlers read at request time.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    pub swagger_enabled: bool,
    /// Lifetime of an invitation whose create request names none.
    pub invitation_ttl: chrono::Duration,
    /// Base of invitation links, without trailing slash.
    pub public_base_url: String,
}

impl ServiceSettings {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            environment: format!("{:?}", config.environment),
            allowed_origins: config.security.allowed_origins.clone(),
            swagger_enabled: config.swagger_enabled,
            invitation_ttl: config.default_invitation_ttl(),
            public_base_url: config.invitation.public_base_url.clone(),
        }
    }

    pub fn invite_url(&self, token: &str) -> String {
        format!("{}/invitation/{}", self.public_base_url, token)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServiceSettings>,
    pub sessions: SessionManager,
    pub invitations: InvitationManager,
    pub gate: AccessGate,
    /// Present when running on PostgreSQL; used by the health check.
    pub db: Option<Database>,
    pub metrics: Option<PrometheusHandle>,
    pub auth_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the three managers over one store implementing every seam.
    pub fn from_store<S>(
        store: Arc<S>,
        settings: ServiceSettings,
        policy: StorePolicy,
        session_settings: SessionSettings,
        auth_rate_limiter: IpRateLimiter,
        ip_rate_limiter: IpRateLimiter,
    ) -> Self
    where
        S: CustomerStore + SessionStore + BoardRegistry + MembershipStore + InvitationStore + 'static,
    {
        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            policy.clone(),
            session_settings,
        );
        let invitations =
            InvitationManager::new(store.clone(), store.clone(), sessions.clone(), policy.clone());
        let gate = AccessGate::new(store.clone(), store, sessions.clone(), policy);

        Self {
            settings: Arc::new(settings),
            sessions,
            invitations,
            gate,
            db: None,
            metrics: None,
            auth_rate_limiter,
            ip_rate_limiter,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    // Credential-bearing actions get their own, tighter limit
    let auth_limiter = state.auth_rate_limiter.clone();
    let auth_route = Router::new()
        .route(
            "/customer-auth",
            post(handlers::customer_auth::customer_auth),
        )
        .layer(from_fn_with_state(auth_limiter, ip_rate_limit_middleware));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.settings.swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let origins = &state.settings.allowed_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        }))
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)]);

    app.merge(auth_route)
        .route(
            "/invitations/:token",
            get(handlers::invitation::get_invitation),
        )
        .route(
            "/boards/:board_id/invitations",
            post(handlers::invitation::create_invitation),
        )
        .route(
            "/portal/:organization/:board_slug",
            get(handlers::portal::portal_access),
        )
        .route(
            "/boards/:board_id/members",
            get(handlers::members::list_members),
        )
        .route(
            "/boards/:board_id/members/:customer_id",
            delete(handlers::members::remove_member),
        )
        .route(
            "/customers/me",
            get(handlers::customer::get_me).patch(handlers::customer::update_me),
        )
        // Route layer so the matched template, not the raw path, labels metrics
        .route_layer(from_fn(metrics_middleware))
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                // Route template only: invitation links carry their token in the URI
                let route = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or("unmatched");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    route = %route,
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Backing store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = match &state.db {
        Some(db) => {
            db.health_check().await.map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                e
            })?;
            "postgresql"
        }
        None => "in_memory",
    };

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.settings.service_name,
        "version": state.settings.service_version,
        "environment": state.settings.environment,
        "checks": {
            "store": store,
            "status": "up"
        }
    })))
}
