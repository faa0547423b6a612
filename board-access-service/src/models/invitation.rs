//! Invitation model - single-use, time-bounded board invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{BoardMembership, BoardRole};

/// Derived lifecycle state. `Accepted` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Pending,
    Accepted,
    Expired,
}

/// Invitation row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationRecord {
    pub invitation_id: Uuid,
    pub board_id: Uuid,
    pub email: String,
    pub role_code: String,
    pub token_hash: String,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub accepted_by_customer_id: Option<Uuid>,
}

/// Board invitation. The record is retained after acceptance for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub board_id: Uuid,
    pub email: String,
    pub role: BoardRole,
    pub token_hash: String,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub accepted_by_customer_id: Option<Uuid>,
}

impl Invitation {
    pub fn new(
        board_id: Uuid,
        email: String,
        role: BoardRole,
        token_hash: String,
        created_utc: DateTime<Utc>,
        expiry_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            board_id,
            email,
            role,
            token_hash,
            created_utc,
            expiry_utc,
            accepted_utc: None,
            accepted_by_customer_id: None,
        }
    }

    /// Acceptance wins over expiry: an invitation accepted before its
    /// deadline stays `Accepted` forever.
    pub fn state_at(&self, now: DateTime<Utc>) -> InvitationState {
        if self.accepted_utc.is_some() {
            InvitationState::Accepted
        } else if now >= self.expiry_utc {
            InvitationState::Expired
        } else {
            InvitationState::Pending
        }
    }
}

impl TryFrom<InvitationRecord> for Invitation {
    type Error = String;

    fn try_from(r: InvitationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            role: r.role_code.parse()?,
            invitation_id: r.invitation_id,
            board_id: r.board_id,
            email: r.email,
            token_hash: r.token_hash,
            created_utc: r.created_utc,
            expiry_utc: r.expiry_utc,
            accepted_utc: r.accepted_utc,
            accepted_by_customer_id: r.accepted_by_customer_id,
        })
    }
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedInvitation {
    pub membership: BoardMembership,
    /// Role held before this redemption overwrote it, if the customer was
    /// already a member.
    pub previous_role: Option<BoardRole>,
}
