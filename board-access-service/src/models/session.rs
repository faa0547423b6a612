//! Customer session model - opaque bearer tokens bound to a customer.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity.
///
/// Only the SHA-256 hash of the bearer token is stored; the token itself is
/// handed to the client once and never persisted.
#[derive(Debug, Clone, FromRow)]
pub struct CustomerSession {
    pub session_id: Uuid,
    pub customer_id: Uuid,
    pub token_hash: String,
    pub issued_utc: DateTime<Utc>,
    pub expiry_utc: Option<DateTime<Utc>>,
    pub revoked_utc: Option<DateTime<Utc>>,
}

impl CustomerSession {
    /// Create a new session. `ttl = None` means the session lives until
    /// sign-out, as does a deadline past the representable range.
    pub fn new(customer_id: Uuid, token_hash: String, ttl: Option<Duration>) -> Self {
        let issued_utc = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            customer_id,
            token_hash,
            issued_utc,
            expiry_utc: ttl.and_then(|ttl| issued_utc.checked_add_signed(ttl)),
            revoked_utc: None,
        }
    }

    /// Check if session is usable at `now` (not expired, not revoked).
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_utc.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }
}
