use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dtos::customer_auth::MembershipView;
use crate::models::{AccessRole, Capability};
use crate::services::{AccessDecision, DenialReason};

/// Outcome of visiting `/portal/{organization}/{board_slug}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PortalAccessResponse {
    #[schema(example = "allowed")]
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<AccessRole>,
    /// Everything the resolved role may do on the board.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl From<AccessDecision> for PortalAccessResponse {
    fn from(decision: AccessDecision) -> Self {
        let label = decision.label().to_string();
        match decision {
            AccessDecision::Allowed { board_id, role, .. } => Self {
                decision: label,
                board_id: Some(board_id),
                role: Some(role),
                capabilities: Capability::ALL
                    .into_iter()
                    .filter(|c| role.has_capability(*c))
                    .collect(),
                reason: None,
            },
            AccessDecision::RequiresAuthentication(reason) => Self {
                decision: label,
                board_id: None,
                role: None,
                capabilities: Vec::new(),
                reason: Some(reason),
            },
            AccessDecision::BoardNotFound => Self {
                decision: label,
                board_id: None,
                role: None,
                capabilities: Vec::new(),
                reason: None,
            },
        }
    }
}

impl IntoResponse for PortalAccessResponse {
    fn into_response(self) -> Response {
        let status = match (self.role.is_some(), self.reason.is_some()) {
            (true, _) => StatusCode::OK,
            (false, true) => StatusCode::UNAUTHORIZED,
            (false, false) => StatusCode::NOT_FOUND,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MembersResponse {
    pub board_id: Uuid,
    pub members: Vec<MembershipView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoardRole;

    #[test]
    fn test_anonymous_viewer_capabilities() {
        let response = PortalAccessResponse::from(AccessDecision::Allowed {
            board_id: Uuid::new_v4(),
            role: AccessRole::AnonymousViewer,
            customer_id: None,
        });
        assert_eq!(response.capabilities, vec![Capability::ViewBoard]);
    }

    #[test]
    fn test_status_codes() {
        let allowed = PortalAccessResponse::from(AccessDecision::Allowed {
            board_id: Uuid::new_v4(),
            role: AccessRole::Member(BoardRole::Admin),
            customer_id: Some(Uuid::new_v4()),
        });
        assert_eq!(allowed.capabilities.len(), Capability::ALL.len());
        assert_eq!(allowed.into_response().status(), StatusCode::OK);

        let denied = PortalAccessResponse::from(AccessDecision::RequiresAuthentication(
            DenialReason::NotAMember,
        ));
        assert_eq!(denied.into_response().status(), StatusCode::UNAUTHORIZED);

        let missing = PortalAccessResponse::from(AccessDecision::BoardNotFound);
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_denial_reason_read_back() {
        let body = r#"{"decision":"requires_authentication","reason":"not_signed_in"}"#;
        let response: PortalAccessResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.reason, Some(DenialReason::NotSignedIn));
        assert!(response.role.is_none());
        assert!(response.capabilities.is_empty());
    }
}
