use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{BoardRole, Invitation, InvitationState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvitationRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "invitee@example.com")]
    pub email: String,

    #[schema(example = "member")]
    pub role: BoardRole,

    /// Defaults to the service's configured invitation lifetime.
    #[validate(range(min = 1, max = 8760, message = "expires_in_hours must be between 1 and 8760"))]
    #[schema(example = 24)]
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateInvitationResponse {
    pub invitation_id: Uuid,
    /// Shown once; only its hash is stored.
    pub invite_token: String,
    #[schema(example = "https://feedback.example.com/invitation/3q2-7w...")]
    pub invite_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Public preview for the `/invitation/{token}` page.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvitationDetailsResponse {
    pub invitation_id: Uuid,
    pub board_id: Uuid,
    pub email: String,
    pub role: BoardRole,
    pub status: InvitationState,
    pub expires_at: DateTime<Utc>,
}

impl InvitationDetailsResponse {
    pub fn from_invitation(invitation: &Invitation, now: DateTime<Utc>) -> Self {
        Self {
            invitation_id: invitation.invitation_id,
            board_id: invitation.board_id,
            email: invitation.email.clone(),
            role: invitation.role,
            status: invitation.state_at(now),
            expires_at: invitation.expiry_utc,
        }
    }
}
