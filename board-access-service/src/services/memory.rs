//! In-process implementation of every store trait.
//!
//! All state sits behind one mutex, so each trait call is a single critical
//! section and gets the same all-or-nothing behaviour as a PostgreSQL
//! transaction. Used by tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{
    BoardRegistry, CustomerStore, InvitationStore, MembershipStore, RedeemOutcome, SessionStore,
    StoreError,
};
use crate::models::{
    normalize_email, AcceptedInvitation, BoardMembership, BoardRole, Customer, CustomerBoard,
    CustomerSession, Invitation,
};

#[derive(Default)]
struct MemoryState {
    customers: HashMap<Uuid, Customer>,
    email_index: HashMap<String, Uuid>,
    credentials: HashMap<Uuid, String>,
    sessions: HashMap<String, CustomerSession>,
    boards: HashMap<Uuid, CustomerBoard>,
    memberships: HashMap<(Uuid, Uuid), BoardMembership>,
    invitations: HashMap<Uuid, Invitation>,
}

impl MemoryState {
    /// Revoked sessions are removed outright; expired ones go on the next
    /// write so the map stays bounded by live sessions.
    fn store_session(&mut self, session: &CustomerSession, now: DateTime<Utc>) {
        self.sessions.retain(|_, s| s.is_valid_at(now));
        self.sessions
            .insert(session.token_hash.clone(), session.clone());
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    /// Number of upcoming calls that fail with `StoreError::Unavailable`.
    failures_pending: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        if self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "simulated store outage"
            )));
        }

        self.state
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }

    /// Make the next `calls` store calls fail as unavailable.
    pub fn fail_next(&self, calls: u32) {
        self.failures_pending.store(calls, Ordering::SeqCst);
    }

    /// Register a board. Boards are owned by an external registry; this is
    /// the seeding hook for that collaborator.
    pub fn insert_board(&self, board: CustomerBoard) -> Result<(), StoreError> {
        self.lock()?.boards.insert(board.board_id, board);
        Ok(())
    }

    /// Direct administrative grant, bypassing invitations.
    pub fn grant_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
        role: BoardRole,
    ) -> Result<BoardMembership, StoreError> {
        let membership = BoardMembership::new(board_id, customer_id, role, Utc::now());
        self.lock()?
            .memberships
            .insert((board_id, customer_id), membership.clone());
        Ok(membership)
    }

    pub fn session_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.sessions.len())
    }

    pub fn customer_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.customers.len())
    }

    pub fn membership_count(&self, board_id: Uuid) -> Result<usize, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .keys()
            .filter(|(b, _)| *b == board_id)
            .count())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn create_customer(
        &self,
        customer: &Customer,
        credential_hash: &str,
        session: &CustomerSession,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let email_key = normalize_email(&customer.email);

        if state.email_index.contains_key(&email_key) {
            return Err(StoreError::UniqueViolation(
                "customers_email_lower_key".to_string(),
            ));
        }

        state.email_index.insert(email_key, customer.customer_id);
        state
            .customers
            .insert(customer.customer_id, customer.clone());
        state
            .credentials
            .insert(customer.customer_id, credential_hash.to_string());
        state.store_session(session, Utc::now());
        Ok(())
    }

    async fn find_customer_by_id(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.lock()?.customers.get(&customer_id).cloned())
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Customer, String)>, StoreError> {
        let state = self.lock()?;
        let found = state
            .email_index
            .get(&normalize_email(email))
            .and_then(|id| {
                let customer = state.customers.get(id)?;
                let hash = state.credentials.get(id)?;
                Some((customer.clone(), hash.clone()))
            });
        Ok(found)
    }

    async fn update_customer_profile(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        match state.customers.get_mut(&customer.customer_id) {
            Some(existing) => {
                existing.first_name = customer.first_name.clone();
                existing.last_name = customer.last_name.clone();
                existing.company = customer.company.clone();
                existing.job_title = customer.job_title.clone();
                existing.updated_utc = customer.updated_utc;
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "Customer {} does not exist",
                customer.customer_id
            ))),
        }
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_session(&self, session: &CustomerSession) -> Result<(), StoreError> {
        self.lock()?.store_session(session, Utc::now());
        Ok(())
    }

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<CustomerSession>, StoreError> {
        Ok(self.lock()?.sessions.get(token_hash).cloned())
    }

    async fn revoke_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let revoked = state
            .sessions
            .remove(token_hash)
            .is_some_and(|session| !session.is_revoked());
        state.sessions.retain(|_, s| s.is_valid_at(now));
        Ok(revoked)
    }
}

#[async_trait]
impl BoardRegistry for InMemoryStore {
    async fn find_board_by_id(&self, board_id: Uuid) -> Result<Option<CustomerBoard>, StoreError> {
        Ok(self.lock()?.boards.get(&board_id).cloned())
    }

    async fn find_board_by_slug(
        &self,
        organization_slug: &str,
        board_slug: &str,
    ) -> Result<Option<CustomerBoard>, StoreError> {
        Ok(self
            .lock()?
            .boards
            .values()
            .find(|b| b.organization_slug == organization_slug && b.board_slug == board_slug)
            .cloned())
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<BoardMembership>, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .get(&(board_id, customer_id))
            .cloned())
    }

    async fn list_memberships(&self, board_id: Uuid) -> Result<Vec<BoardMembership>, StoreError> {
        let mut members: Vec<BoardMembership> = self
            .lock()?
            .memberships
            .values()
            .filter(|m| m.board_id == board_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.joined_utc);
        Ok(members)
    }

    async fn remove_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .memberships
            .remove(&(board_id, customer_id))
            .is_some())
    }
}

#[async_trait]
impl InvitationStore for InMemoryStore {
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state
            .invitations
            .values()
            .any(|i| i.token_hash == invitation.token_hash)
        {
            return Err(StoreError::UniqueViolation(
                "board_invitations_token_hash_key".to_string(),
            ));
        }
        state
            .invitations
            .insert(invitation.invitation_id, invitation.clone());
        Ok(())
    }

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        Ok(self
            .lock()?
            .invitations
            .values()
            .find(|i| i.token_hash == token_hash)
            .cloned())
    }

    async fn redeem_invitation(
        &self,
        invitation_id: Uuid,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, StoreError> {
        let mut state = self.lock()?;

        let Some(invitation) = state.invitations.get_mut(&invitation_id) else {
            return Ok(RedeemOutcome::NotFound);
        };
        if now >= invitation.expiry_utc {
            return Ok(RedeemOutcome::Expired);
        }
        if invitation.accepted_utc.is_some() {
            return Ok(RedeemOutcome::AlreadyAccepted);
        }

        invitation.accepted_utc = Some(now);
        invitation.accepted_by_customer_id = Some(customer_id);
        let board_id = invitation.board_id;
        let role = invitation.role;

        let key = (board_id, customer_id);
        let previous_role = state.memberships.get(&key).map(|m| m.role);
        let membership = match state.memberships.get_mut(&key) {
            Some(existing) => {
                existing.role = role;
                existing.updated_utc = now;
                existing.clone()
            }
            None => {
                let created = BoardMembership::new(board_id, customer_id, role, now);
                state.memberships.insert(key, created.clone());
                created
            }
        };

        Ok(RedeemOutcome::Redeemed(AcceptedInvitation {
            membership,
            previous_role,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerProfile;
    use chrono::Duration;

    async fn sign_up(store: &InMemoryStore, email: &str) -> Uuid {
        let customer = Customer::new(email, CustomerProfile::default());
        let session = CustomerSession::new(customer.customer_id, format!("{}-first", email), None);
        store
            .create_customer(&customer, "hash", &session)
            .await
            .unwrap();
        customer.customer_id
    }

    #[tokio::test]
    async fn test_revoked_sessions_are_dropped() {
        let store = InMemoryStore::new();
        let customer_id = sign_up(&store, "a@x.com").await;
        let second = CustomerSession::new(customer_id, "second".to_string(), None);
        store.insert_session(&second).await.unwrap();
        assert_eq!(store.session_count().unwrap(), 2);

        assert!(store.revoke_session("second", Utc::now()).await.unwrap());
        assert!(!store.revoke_session("second", Utc::now()).await.unwrap());
        assert_eq!(store.session_count().unwrap(), 1);
        assert!(store
            .find_session_by_token_hash("second")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_session_by_token_hash("a@x.com-first")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_pruned_on_write() {
        let store = InMemoryStore::new();
        let customer_id = sign_up(&store, "a@x.com").await;
        for i in 0..5 {
            let expired =
                CustomerSession::new(customer_id, format!("expired-{}", i), Some(Duration::zero()));
            store.insert_session(&expired).await.unwrap();
        }

        let live = CustomerSession::new(customer_id, "live".to_string(), Some(Duration::hours(1)));
        store.insert_session(&live).await.unwrap();

        assert_eq!(store.session_count().unwrap(), 2);

        sign_up(&store, "b@x.com").await;
        assert_eq!(store.session_count().unwrap(), 3);
    }
}
