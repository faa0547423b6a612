use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use utoipa::ToSchema;

use crate::models::{BoardMembership, CustomerView};
use crate::services::ServiceError;

/// Body of `POST /customer-auth`. The `action` field selects the variant and
/// each variant carries only the fields that action needs.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CustomerAuthRequest {
    Register {
        #[schema(example = "customer@example.com")]
        email: String,
        #[schema(example = "secret1", min_length = 6)]
        password: String,
        #[serde(default)]
        first_name: Option<String>,
        #[serde(default)]
        last_name: Option<String>,
        #[serde(default)]
        company: Option<String>,
        #[serde(default)]
        job_title: Option<String>,
    },
    Login {
        #[schema(example = "customer@example.com")]
        email: String,
        password: String,
    },
    Logout {
        token: String,
    },
    VerifyToken {
        token: String,
    },
    AcceptInvitation {
        invitation_token: String,
        session_token: String,
    },
}

impl CustomerAuthRequest {
    pub fn action(&self) -> &'static str {
        match self {
            CustomerAuthRequest::Register { .. } => "register",
            CustomerAuthRequest::Login { .. } => "login",
            CustomerAuthRequest::Logout { .. } => "logout",
            CustomerAuthRequest::VerifyToken { .. } => "verify-token",
            CustomerAuthRequest::AcceptInvitation { .. } => "accept-invitation",
        }
    }
}

/// Response of `POST /customer-auth`; success is signalled by the absence
/// of `error`.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CustomerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Invalid email or password")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipView {
    pub board_id: uuid::Uuid,
    pub customer_id: uuid::Uuid,
    #[schema(example = "member")]
    pub role: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl From<BoardMembership> for MembershipView {
    fn from(m: BoardMembership) -> Self {
        Self {
            board_id: m.board_id,
            customer_id: m.customer_id,
            role: m.role.as_str().to_string(),
            joined_at: m.joined_utc,
        }
    }
}

impl ActionResponse {
    pub fn ok(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }

    /// Error envelope using the same status and message mapping as every
    /// other endpoint.
    pub fn failure(err: ServiceError) -> Response {
        Self::from_app_error(AppError::from(err))
    }

    pub fn from_app_error(err: AppError) -> Response {
        let (status, message, _, retry_after) = err.parts();
        if status.is_server_error() {
            tracing::error!(error = %err, status = %status, "Customer auth action failed");
        }

        let mut res = (
            status,
            Json(ActionResponse {
                error: Some(message),
                ..Default::default()
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }
        res
    }
}
