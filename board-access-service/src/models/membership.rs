//! Board membership model - (board, customer) role grants.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::BoardRole;

/// Membership row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipRecord {
    pub board_id: Uuid,
    pub customer_id: Uuid,
    pub role_code: String,
    pub joined_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Durable grant of a role on a board to a customer. Unique per (board, customer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoardMembership {
    pub board_id: Uuid,
    pub customer_id: Uuid,
    pub role: BoardRole,
    pub joined_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl BoardMembership {
    pub fn new(board_id: Uuid, customer_id: Uuid, role: BoardRole, now: DateTime<Utc>) -> Self {
        Self {
            board_id,
            customer_id,
            role,
            joined_utc: now,
            updated_utc: now,
        }
    }
}

impl TryFrom<MembershipRecord> for BoardMembership {
    type Error = String;

    fn try_from(r: MembershipRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            role: r.role_code.parse()?,
            board_id: r.board_id,
            customer_id: r.customer_id,
            joined_utc: r.joined_utc,
            updated_utc: r.updated_utc,
        })
    }
}
