//! Board roles and the fixed role-capability table.
//!
//! Roles are totally ordered (`viewer < member < admin`) and every
//! capability names the lowest role that holds it, so the table is monotonic
//! by construction: anything a viewer may do, a member and an admin may do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Role a customer holds on a board. Declaration order is privilege order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BoardRole {
    Viewer,
    Member,
    Admin,
}

impl BoardRole {
    pub const ALL: [BoardRole; 3] = [BoardRole::Viewer, BoardRole::Member, BoardRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardRole::Viewer => "viewer",
            BoardRole::Member => "member",
            BoardRole::Admin => "admin",
        }
    }
}

impl FromStr for BoardRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(BoardRole::Viewer),
            "member" => Ok(BoardRole::Member),
            "admin" => Ok(BoardRole::Admin),
            _ => Err(format!("Invalid board role: {}", s)),
        }
    }
}

impl fmt::Display for BoardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a board that feature modules gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewBoard,
    ViewMembers,
    SubmitFeedback,
    Vote,
    Comment,
    InviteMembers,
    RemoveMembers,
    ToggleBoardActivation,
    ManageBoardSettings,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::ViewBoard,
        Capability::ViewMembers,
        Capability::SubmitFeedback,
        Capability::Vote,
        Capability::Comment,
        Capability::InviteMembers,
        Capability::RemoveMembers,
        Capability::ToggleBoardActivation,
        Capability::ManageBoardSettings,
    ];

    /// Lowest role granted this capability.
    pub fn minimum_role(&self) -> BoardRole {
        match self {
            Capability::ViewBoard | Capability::ViewMembers => BoardRole::Viewer,
            Capability::SubmitFeedback | Capability::Vote | Capability::Comment => {
                BoardRole::Member
            }
            Capability::InviteMembers
            | Capability::RemoveMembers
            | Capability::ToggleBoardActivation
            | Capability::ManageBoardSettings => BoardRole::Admin,
        }
    }
}

/// Single source of truth for role-based capability checks.
pub fn has_capability(role: BoardRole, capability: Capability) -> bool {
    role >= capability.minimum_role()
}

/// Role under which a visitor is allowed onto a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "role")]
pub enum AccessRole {
    /// Unauthenticated visitor of a fully public board.
    AnonymousViewer,
    /// Signed-in customer holding a membership.
    Member(BoardRole),
}

impl AccessRole {
    /// Anonymous visitors may only look at the board.
    pub fn has_capability(&self, capability: Capability) -> bool {
        match self {
            AccessRole::AnonymousViewer => capability == Capability::ViewBoard,
            AccessRole::Member(role) => has_capability(*role, capability),
        }
    }
}
