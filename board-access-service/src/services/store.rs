//! Storage seams for the board access core.
//!
//! Each store is a trait so the managers can run against PostgreSQL in
//! production and [`InMemoryStore`](super::InMemoryStore) in tests. Atomicity
//! that the core relies on (sign-up, invitation redemption) is expressed as a
//! single store call, never as a read followed by a write in the manager.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::retry::{retry_transient, with_timeout, RetryConfig, Transient};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AcceptedInvitation, BoardMembership, Customer, CustomerBoard, CustomerSession, Invitation,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Timeouts, exhausted pools, dropped connections.
    #[error("Store unavailable: {0}")]
    Unavailable(anyhow::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Store error: {0}")]
    Backend(anyhow::Error),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Customer identities and their credential hashes.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Insert the customer, its credential hash and its first session in one
    /// transaction. A taken email (case-insensitive) fails with
    /// [`StoreError::UniqueViolation`] and leaves nothing behind.
    async fn create_customer(
        &self,
        customer: &Customer,
        credential_hash: &str,
        session: &CustomerSession,
    ) -> Result<(), StoreError>;

    async fn find_customer_by_id(&self, customer_id: Uuid) -> Result<Option<Customer>, StoreError>;

    /// Look up a customer and its credential hash by normalised email.
    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Customer, String)>, StoreError>;

    async fn update_customer_profile(&self, customer: &Customer) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &CustomerSession) -> Result<(), StoreError>;

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<CustomerSession>, StoreError>;

    /// Mark the session revoked. Returns `false` when it was unknown or
    /// already revoked.
    async fn revoke_session(&self, token_hash: &str, now: DateTime<Utc>)
        -> Result<bool, StoreError>;
}

/// Read-only view of board configuration.
#[async_trait]
pub trait BoardRegistry: Send + Sync {
    async fn find_board_by_id(&self, board_id: Uuid) -> Result<Option<CustomerBoard>, StoreError>;

    async fn find_board_by_slug(
        &self,
        organization_slug: &str,
        board_slug: &str,
    ) -> Result<Option<CustomerBoard>, StoreError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        board_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<BoardMembership>, StoreError>;

    async fn list_memberships(&self, board_id: Uuid) -> Result<Vec<BoardMembership>, StoreError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_membership(&self, board_id: Uuid, customer_id: Uuid)
        -> Result<bool, StoreError>;
}

/// What happened when a redemption was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Redeemed(AcceptedInvitation),
    NotFound,
    Expired,
    AlreadyAccepted,
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), StoreError>;

    async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, StoreError>;

    /// Claim the invitation for `customer_id` and write the membership as one
    /// transaction.
    ///
    /// The claim is a compare-and-set on `accepted_utc` (only while it is null
    /// and `now < expiry_utc`), so of any number of concurrent callers exactly
    /// one sees [`RedeemOutcome::Redeemed`]. The membership is created, or its
    /// role overwritten with the invitation's role.
    async fn redeem_invitation(
        &self,
        invitation_id: Uuid,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome, StoreError>;
}

/// Timeouts and retry budget applied to every store call.
#[derive(Debug, Clone)]
pub struct StorePolicy {
    reads: RetryConfig,
    call_timeout: Duration,
}

impl StorePolicy {
    pub fn new(call_timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            reads: RetryConfig::single_retry(retry_backoff, call_timeout),
            call_timeout,
        }
    }

    /// Read-only or idempotent call: bounded by the deadline and retried at
    /// most once when the store is unavailable.
    pub async fn read<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        retry_transient(&self.reads, operation, f, || {
            StoreError::Unavailable(anyhow::anyhow!("{} timed out", operation))
        })
        .await
    }

    /// Non-idempotent write: bounded by the deadline, never retried.
    pub async fn write<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        with_timeout(self.call_timeout, operation, f, || {
            StoreError::Unavailable(anyhow::anyhow!("{} timed out", operation))
        })
        .await
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_millis(100))
    }
}
