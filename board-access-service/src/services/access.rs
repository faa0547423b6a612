//! Access Gate: decides, per request, whether a session may view or act on a
//! board and under which role.
//!
//! Nothing here is cached. Board configuration and memberships are read
//! fresh on every call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::ServiceError;
use super::metrics;
use super::session::SessionManager;
use super::store::{BoardRegistry, MembershipStore, StorePolicy};
use crate::models::{AccessRole, BoardMembership, Capability, CustomerBoard};

/// Why a restricted board turned a visitor away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No session, or the token is malformed, unknown, expired or revoked.
    NotSignedIn,
    /// Valid session, but the customer holds no membership on the board.
    NotAMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed {
        board_id: Uuid,
        role: AccessRole,
        /// `None` unless the visitor presented a valid session.
        customer_id: Option<Uuid>,
    },
    RequiresAuthentication(DenialReason),
    BoardNotFound,
}

impl AccessDecision {
    pub fn label(&self) -> &'static str {
        match self {
            AccessDecision::Allowed { .. } => "allowed",
            AccessDecision::RequiresAuthentication(_) => "requires_authentication",
            AccessDecision::BoardNotFound => "board_not_found",
        }
    }

    pub fn role(&self) -> Option<AccessRole> {
        match self {
            AccessDecision::Allowed { role, .. } => Some(*role),
            _ => None,
        }
    }
}

/// A caller that passed a capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedCaller {
    pub customer_id: Uuid,
    pub role: AccessRole,
}

#[derive(Clone)]
pub struct AccessGate {
    boards: Arc<dyn BoardRegistry>,
    memberships: Arc<dyn MembershipStore>,
    sessions: SessionManager,
    policy: StorePolicy,
}

impl AccessGate {
    pub fn new(
        boards: Arc<dyn BoardRegistry>,
        memberships: Arc<dyn MembershipStore>,
        sessions: SessionManager,
        policy: StorePolicy,
    ) -> Self {
        Self {
            boards,
            memberships,
            sessions,
            policy,
        }
    }

    /// Resolve access to a board by id.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn resolve(
        &self,
        board_id: Uuid,
        session_token: Option<&str>,
    ) -> Result<AccessDecision, ServiceError> {
        let board = self
            .policy
            .read("find_board", || self.boards.find_board_by_id(board_id))
            .await?;
        self.decide(board, session_token).await
    }

    /// Resolve access to a board addressed by its portal URL.
    #[instrument(skip_all, fields(organization = %organization_slug, board = %board_slug))]
    pub async fn resolve_slug(
        &self,
        organization_slug: &str,
        board_slug: &str,
        session_token: Option<&str>,
    ) -> Result<AccessDecision, ServiceError> {
        let board = self
            .policy
            .read("find_board_by_slug", || {
                self.boards.find_board_by_slug(organization_slug, board_slug)
            })
            .await?;
        self.decide(board, session_token).await
    }

    async fn decide(
        &self,
        board: Option<CustomerBoard>,
        session_token: Option<&str>,
    ) -> Result<AccessDecision, ServiceError> {
        let decision = match board {
            None => AccessDecision::BoardNotFound,
            Some(board) if !board.requires_membership() => {
                self.public_decision(&board, session_token).await
            }
            Some(board) => self.restricted_decision(&board, session_token).await?,
        };

        metrics::record_access_decision(decision.label());
        tracing::debug!(decision = decision.label(), "Access resolved");
        Ok(decision)
    }

    /// Public boards never require a session. A signed-in member still gets
    /// their own role; everyone else views anonymously, keeping their
    /// customer id when the session is valid.
    async fn public_decision(
        &self,
        board: &CustomerBoard,
        session_token: Option<&str>,
    ) -> AccessDecision {
        let anonymous = |customer_id: Option<Uuid>| AccessDecision::Allowed {
            board_id: board.board_id,
            role: AccessRole::AnonymousViewer,
            customer_id,
        };

        let Some(token) = session_token else {
            return anonymous(None);
        };

        let customer = match self.sessions.verify_token(token).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return anonymous(None),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed on public board");
                return anonymous(None);
            }
        };

        match self.member_decision(board, customer.customer_id).await {
            Ok(AccessDecision::RequiresAuthentication(_)) => anonymous(Some(customer.customer_id)),
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "Membership lookup failed on public board");
                anonymous(Some(customer.customer_id))
            }
        }
    }

    async fn restricted_decision(
        &self,
        board: &CustomerBoard,
        session_token: Option<&str>,
    ) -> Result<AccessDecision, ServiceError> {
        let customer = match session_token {
            Some(token) => self.sessions.verify_token(token).await?,
            None => None,
        };
        match customer {
            Some(customer) => self.member_decision(board, customer.customer_id).await,
            None => Ok(AccessDecision::RequiresAuthentication(
                DenialReason::NotSignedIn,
            )),
        }
    }

    async fn member_decision(
        &self,
        board: &CustomerBoard,
        customer_id: Uuid,
    ) -> Result<AccessDecision, ServiceError> {
        let membership = self
            .policy
            .read("find_membership", || {
                self.memberships.find_membership(board.board_id, customer_id)
            })
            .await?;

        Ok(match membership {
            Some(m) => AccessDecision::Allowed {
                board_id: board.board_id,
                role: AccessRole::Member(m.role),
                customer_id: Some(customer_id),
            },
            None => AccessDecision::RequiresAuthentication(DenialReason::NotAMember),
        })
    }

    /// Resolve access and require `capability`.
    ///
    /// Visitors without a valid session are `Unauthenticated`. Signed-in
    /// callers whose role lacks the capability are `Forbidden`, including
    /// non-members viewing a public board.
    pub async fn require_capability(
        &self,
        board_id: Uuid,
        session_token: Option<&str>,
        capability: Capability,
    ) -> Result<AuthorizedCaller, ServiceError> {
        match self.resolve(board_id, session_token).await? {
            AccessDecision::BoardNotFound => Err(ServiceError::BoardNotFound),
            AccessDecision::RequiresAuthentication(DenialReason::NotSignedIn) => {
                Err(ServiceError::Unauthenticated)
            }
            AccessDecision::RequiresAuthentication(DenialReason::NotAMember) => Err(
                ServiceError::Forbidden("Not a member of this board".to_string()),
            ),
            AccessDecision::Allowed {
                customer_id: None, ..
            } => Err(ServiceError::Unauthenticated),
            AccessDecision::Allowed {
                role,
                customer_id: Some(customer_id),
                ..
            } => {
                if !role.has_capability(capability) {
                    tracing::info!(
                        customer_id = %customer_id,
                        capability = ?capability,
                        "Capability denied"
                    );
                    return Err(ServiceError::Forbidden(
                        "Insufficient role for this operation".to_string(),
                    ));
                }
                Ok(AuthorizedCaller { customer_id, role })
            }
        }
    }

    pub async fn list_members(
        &self,
        board_id: Uuid,
        session_token: Option<&str>,
    ) -> Result<Vec<BoardMembership>, ServiceError> {
        self.require_capability(board_id, session_token, Capability::ViewMembers)
            .await?;

        let members = self
            .policy
            .read("list_memberships", || {
                self.memberships.list_memberships(board_id)
            })
            .await?;
        Ok(members)
    }

    /// Removing a customer that is not a member succeeds.
    #[instrument(skip_all, fields(board_id = %board_id, customer_id = %customer_id))]
    pub async fn remove_member(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
        session_token: Option<&str>,
    ) -> Result<(), ServiceError> {
        let caller = self
            .require_capability(board_id, session_token, Capability::RemoveMembers)
            .await?;

        let removed = self
            .policy
            .write("remove_membership", || {
                self.memberships.remove_membership(board_id, customer_id)
            })
            .await?;

        if removed {
            tracing::info!(removed_by = %caller.customer_id, "Board member removed");
        }
        Ok(())
    }
}
