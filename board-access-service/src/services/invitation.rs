//! Invitation Manager: issues single-use, time-bounded invitation tokens and
//! redeems them into board memberships.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::error::ServiceError;
use super::metrics;
use super::session::SessionManager;
use super::store::{BoardRegistry, InvitationStore, RedeemOutcome, StorePolicy};
use crate::models::{normalize_email, AcceptedInvitation, BoardRole, Invitation};
use crate::utils::{generate_token, hash_token, looks_like_token};

/// An invitation together with its clear-text token, returned once at
/// creation so it can be delivered to the invitee.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub token: String,
}

#[derive(Clone)]
pub struct InvitationManager {
    boards: Arc<dyn BoardRegistry>,
    invitations: Arc<dyn InvitationStore>,
    sessions: SessionManager,
    policy: StorePolicy,
}

impl InvitationManager {
    pub fn new(
        boards: Arc<dyn BoardRegistry>,
        invitations: Arc<dyn InvitationStore>,
        sessions: SessionManager,
        policy: StorePolicy,
    ) -> Self {
        Self {
            boards,
            invitations,
            sessions,
            policy,
        }
    }

    /// Invite `email` to `board_id` with `role`, valid for `ttl`.
    ///
    /// Several pending invitations for the same board and email may coexist.
    #[instrument(skip_all, fields(board_id = %board_id))]
    pub async fn create_invitation(
        &self,
        board_id: Uuid,
        email: &str,
        role: BoardRole,
        ttl: Duration,
    ) -> Result<IssuedInvitation, ServiceError> {
        if ttl <= Duration::zero() {
            return Err(ServiceError::Validation(
                "Invitation lifetime must be positive".to_string(),
            ));
        }
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServiceError::Validation("Email is required".to_string()));
        }

        self.policy
            .read("find_board", || self.boards.find_board_by_id(board_id))
            .await?
            .ok_or(ServiceError::BoardNotFound)?;

        let now = Utc::now();
        let expiry_utc = now.checked_add_signed(ttl).ok_or_else(|| {
            ServiceError::Validation("Invitation lifetime is too long".to_string())
        })?;

        let token = generate_token();
        let invitation = Invitation::new(board_id, email, role, hash_token(&token), now, expiry_utc);

        self.policy
            .write("insert_invitation", || {
                self.invitations.insert_invitation(&invitation)
            })
            .await?;

        tracing::info!(
            invitation_id = %invitation.invitation_id,
            role = %role,
            expires_at = %invitation.expiry_utc,
            "Invitation created"
        );

        Ok(IssuedInvitation { invitation, token })
    }

    pub async fn get_invitation(&self, token: &str) -> Result<Invitation, ServiceError> {
        if !looks_like_token(token) {
            return Err(ServiceError::InvitationNotFound);
        }

        let token_hash = hash_token(token);
        self.policy
            .read("find_invitation", || {
                self.invitations.find_invitation_by_token_hash(&token_hash)
            })
            .await?
            .ok_or(ServiceError::InvitationNotFound)
    }

    pub async fn accept_invitation(
        &self,
        token: &str,
        session_token: &str,
    ) -> Result<AcceptedInvitation, ServiceError> {
        self.accept_invitation_at(token, session_token, Utc::now())
            .await
    }

    /// Redeem `token` for the customer owning `session_token`, evaluating
    /// expiry against `now`.
    ///
    /// Checks run in order: session, existence, expiry, prior acceptance.
    /// The early checks only short-circuit obvious failures; the store's
    /// compare-and-set decides races, so concurrent callers see exactly one
    /// success and `InvitationAlreadyAccepted` for the rest.
    #[instrument(skip_all)]
    pub async fn accept_invitation_at(
        &self,
        token: &str,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<AcceptedInvitation, ServiceError> {
        let customer = self.sessions.authenticate(Some(session_token)).await?;
        let invitation = self.get_invitation(token).await?;

        if now >= invitation.expiry_utc {
            return Err(ServiceError::InvitationExpired);
        }
        if invitation.accepted_utc.is_some() {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        let outcome = self
            .policy
            .write("redeem_invitation", || {
                self.invitations.redeem_invitation(
                    invitation.invitation_id,
                    customer.customer_id,
                    now,
                )
            })
            .await?;

        let accepted = match outcome {
            RedeemOutcome::Redeemed(accepted) => accepted,
            RedeemOutcome::NotFound => return Err(ServiceError::InvitationNotFound),
            RedeemOutcome::Expired => return Err(ServiceError::InvitationExpired),
            RedeemOutcome::AlreadyAccepted => {
                tracing::info!(
                    invitation_id = %invitation.invitation_id,
                    customer_id = %customer.customer_id,
                    "Lost invitation redemption race"
                );
                return Err(ServiceError::InvitationAlreadyAccepted);
            }
        };

        metrics::record_invitation_accepted();
        match accepted.previous_role {
            Some(previous) if previous != accepted.membership.role => tracing::info!(
                invitation_id = %invitation.invitation_id,
                board_id = %invitation.board_id,
                customer_id = %customer.customer_id,
                previous_role = %previous,
                role = %accepted.membership.role,
                "Invitation accepted, membership role overwritten"
            ),
            _ => tracing::info!(
                invitation_id = %invitation.invitation_id,
                board_id = %invitation.board_id,
                customer_id = %customer.customer_id,
                role = %accepted.membership.role,
                "Invitation accepted"
            ),
        }

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessType, CustomerBoard, CustomerProfile, InvitationState};
    use crate::services::{InMemoryStore, SessionSettings};
    use crate::utils::Password;

    struct Fixture {
        store: Arc<InMemoryStore>,
        sessions: SessionManager,
        invitations: InvitationManager,
        board_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let policy = StorePolicy::new(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_millis(1),
        );
        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            policy.clone(),
            SessionSettings::default(),
        );
        let invitations =
            InvitationManager::new(store.clone(), store.clone(), sessions.clone(), policy);

        let board_id = Uuid::new_v4();
        store
            .insert_board(CustomerBoard {
                board_id,
                organization_slug: "acme".to_string(),
                board_slug: "feedback".to_string(),
                board_name: "Feedback".to_string(),
                is_public: false,
                access_type: AccessType::InviteOnly,
            })
            .unwrap();

        Fixture {
            store,
            sessions,
            invitations,
            board_id,
        }
    }

    async fn session_for(sessions: &SessionManager, email: &str) -> String {
        sessions
            .sign_up(
                email,
                Password::new("secret1".to_string()),
                CustomerProfile::default(),
            )
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn test_create_invitation_unknown_board() {
        let f = fixture();
        let err = f
            .invitations
            .create_invitation(Uuid::new_v4(), "a@x.com", BoardRole::Member, Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BoardNotFound));
    }

    #[tokio::test]
    async fn test_create_invitation_rejects_non_positive_ttl() {
        let f = fixture();
        let err = f
            .invitations
            .create_invitation(f.board_id, "a@x.com", BoardRole::Member, Duration::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_invitation_rejects_unrepresentable_ttl() {
        let f = fixture();
        let err = f
            .invitations
            .create_invitation(
                f.board_id,
                "a@x.com",
                BoardRole::Member,
                Duration::hours(100_000_000_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_invitation_by_token() {
        let f = fixture();
        let issued = f
            .invitations
            .create_invitation(f.board_id, "A@X.com", BoardRole::Viewer, Duration::hours(1))
            .await
            .unwrap();

        let found = f.invitations.get_invitation(&issued.token).await.unwrap();
        assert_eq!(found.invitation_id, issued.invitation.invitation_id);
        assert_eq!(found.email, "a@x.com");
        assert_eq!(found.state_at(Utc::now()), InvitationState::Pending);

        let err = f.invitations.get_invitation("not-a-token").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvitationNotFound));
    }

    #[tokio::test]
    async fn test_accept_requires_live_session() {
        let f = fixture();
        let issued = f
            .invitations
            .create_invitation(f.board_id, "a@x.com", BoardRole::Member, Duration::hours(1))
            .await
            .unwrap();

        let err = f
            .invitations
            .accept_invitation(&issued.token, &generate_token())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_accept_at_expiry_boundary() {
        let f = fixture();
        let session = session_for(&f.sessions, "a@x.com").await;
        let issued = f
            .invitations
            .create_invitation(f.board_id, "a@x.com", BoardRole::Member, Duration::hours(1))
            .await
            .unwrap();
        let expires_at = issued.invitation.expiry_utc;

        let late = f
            .invitations
            .accept_invitation_at(&issued.token, &session, expires_at + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(late, ServiceError::InvitationExpired));

        let on_time = f
            .invitations
            .accept_invitation_at(&issued.token, &session, expires_at - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(on_time.membership.role, BoardRole::Member);
    }

    #[tokio::test]
    async fn test_token_is_single_use_across_identities() {
        let f = fixture();
        let first = session_for(&f.sessions, "first@x.com").await;
        let second = session_for(&f.sessions, "second@x.com").await;
        let issued = f
            .invitations
            .create_invitation(f.board_id, "first@x.com", BoardRole::Member, Duration::hours(24))
            .await
            .unwrap();

        f.invitations
            .accept_invitation(&issued.token, &first)
            .await
            .unwrap();
        let err = f
            .invitations
            .accept_invitation(&issued.token, &second)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvitationAlreadyAccepted));
        assert_eq!(f.store.membership_count(f.board_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invitation_role_overwrites_existing_membership() {
        let f = fixture();
        let session = session_for(&f.sessions, "admin@x.com").await;
        let customer = f
            .sessions
            .verify_token(&session)
            .await
            .unwrap()
            .unwrap();
        f.store
            .grant_membership(f.board_id, customer.customer_id, BoardRole::Admin)
            .unwrap();

        let issued = f
            .invitations
            .create_invitation(f.board_id, "admin@x.com", BoardRole::Viewer, Duration::hours(1))
            .await
            .unwrap();
        let accepted = f
            .invitations
            .accept_invitation(&issued.token, &session)
            .await
            .unwrap();

        assert_eq!(accepted.previous_role, Some(BoardRole::Admin));
        assert_eq!(accepted.membership.role, BoardRole::Viewer);
        assert_eq!(f.store.membership_count(f.board_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_beats_accepted() {
        let f = fixture();
        let session = session_for(&f.sessions, "a@x.com").await;
        let issued = f
            .invitations
            .create_invitation(f.board_id, "a@x.com", BoardRole::Member, Duration::hours(1))
            .await
            .unwrap();
        f.invitations
            .accept_invitation(&issued.token, &session)
            .await
            .unwrap();

        let err = f
            .invitations
            .accept_invitation_at(&issued.token, &session, Utc::now() + Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvitationExpired));
    }
}
