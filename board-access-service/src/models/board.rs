//! Customer board model - read-only view of board visibility configuration.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Board access type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Public,
    Private,
    InviteOnly,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Public => "public",
            AccessType::Private => "private",
            AccessType::InviteOnly => "invite_only",
        }
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(AccessType::Public),
            "private" => Ok(AccessType::Private),
            "invite_only" => Ok(AccessType::InviteOnly),
            _ => Err(format!("Invalid access type: {}", s)),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer-facing feedback board, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct BoardRecord {
    pub board_id: Uuid,
    pub organization_slug: String,
    pub board_slug: String,
    pub board_name: String,
    pub is_public: bool,
    pub access_type_code: String,
}

/// Customer-facing feedback board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerBoard {
    pub board_id: Uuid,
    pub organization_slug: String,
    pub board_slug: String,
    pub board_name: String,
    pub is_public: bool,
    pub access_type: AccessType,
}

impl CustomerBoard {
    /// A board is open to anonymous visitors only when it is both flagged
    /// public and configured with the public access type. Every other
    /// combination requires a membership.
    pub fn requires_membership(&self) -> bool {
        !(self.is_public && self.access_type == AccessType::Public)
    }
}

impl TryFrom<BoardRecord> for CustomerBoard {
    type Error = String;

    fn try_from(r: BoardRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            access_type: r.access_type_code.parse()?,
            board_id: r.board_id,
            organization_slug: r.organization_slug,
            board_slug: r.board_slug,
            board_name: r.board_name,
            is_public: r.is_public,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(is_public: bool, access_type: AccessType) -> CustomerBoard {
        CustomerBoard {
            board_id: Uuid::new_v4(),
            organization_slug: "acme".to_string(),
            board_slug: "feedback".to_string(),
            board_name: "Feedback".to_string(),
            is_public,
            access_type,
        }
    }

    #[test]
    fn test_only_public_public_is_open() {
        assert!(!board(true, AccessType::Public).requires_membership());
        assert!(board(false, AccessType::Public).requires_membership());
        assert!(board(true, AccessType::Private).requires_membership());
        assert!(board(true, AccessType::InviteOnly).requires_membership());
        assert!(board(false, AccessType::InviteOnly).requires_membership());
    }

    #[test]
    fn test_record_with_unknown_access_type_is_rejected() {
        let record = BoardRecord {
            board_id: Uuid::new_v4(),
            organization_slug: "acme".to_string(),
            board_slug: "b".to_string(),
            board_name: "B".to_string(),
            is_public: true,
            access_type_code: "everyone".to_string(),
        };
        assert!(CustomerBoard::try_from(record).is_err());
    }
}
