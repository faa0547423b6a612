//! Session Manager: sign-up, sign-in, sign-out, token verification and the
//! customer's own profile.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::instrument;

use super::error::ServiceError;
use super::metrics;
use super::store::{CustomerStore, SessionStore, StoreError, StorePolicy};
use crate::models::{normalize_email, Customer, CustomerProfile, CustomerSession, ProfileUpdate};
use crate::utils::{
    generate_token, hash_password, hash_token, looks_like_token, verify_against_dummy,
    verify_password, Password, PasswordHashString,
};

/// Absolute floor for the password policy.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// `None` keeps sessions alive until sign-out.
    pub session_ttl: Option<Duration>,
    pub password_min_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_ttl: None,
            password_min_length: MIN_PASSWORD_LENGTH,
        }
    }
}

/// A freshly issued bearer token together with its owner.
///
/// The token exists in clear only here; the store keeps its hash.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub token: String,
    pub customer: Customer,
}

#[derive(Clone)]
pub struct SessionManager {
    customers: Arc<dyn CustomerStore>,
    sessions: Arc<dyn SessionStore>,
    policy: StorePolicy,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        customers: Arc<dyn CustomerStore>,
        sessions: Arc<dyn SessionStore>,
        policy: StorePolicy,
        settings: SessionSettings,
    ) -> Self {
        Self {
            customers,
            sessions,
            policy,
            settings,
        }
    }

    fn issue_session(&self, customer: &Customer) -> (String, CustomerSession) {
        let token = generate_token();
        let session = CustomerSession::new(
            customer.customer_id,
            hash_token(&token),
            self.settings.session_ttl,
        );
        (token, session)
    }

    fn check_password_policy(&self, password: &Password) -> Result<(), ServiceError> {
        let min = self.settings.password_min_length.max(MIN_PASSWORD_LENGTH);
        if password.char_len() < min {
            return Err(ServiceError::WeakCredential(format!(
                "Password must be at least {} characters",
                min
            )));
        }
        Ok(())
    }

    /// Register a customer and open its first session.
    ///
    /// Identity, credential and session are written in one store call; the
    /// email uniqueness check is the store's unique constraint, not a prior
    /// lookup.
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        email: &str,
        password: Password,
        profile: CustomerProfile,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServiceError::Validation("Email is required".to_string()));
        }
        self.check_password_policy(&password)?;

        let password_hash = hash_password(&password)?;
        let customer = Customer::new(&email, profile.normalized());
        let (token, session) = self.issue_session(&customer);

        self.policy
            .write("create_customer", || {
                self.customers
                    .create_customer(&customer, password_hash.as_str(), &session)
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => ServiceError::DuplicateEmail,
                other => other.into(),
            })?;

        metrics::record_sign_up();
        tracing::info!(customer_id = %customer.customer_id, "Customer registered");

        Ok(AuthenticatedSession { token, customer })
    }

    /// Unknown email and wrong password fail identically, including the
    /// Argon2 work performed.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        email: &str,
        password: Password,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let email = normalize_email(email);

        let found = self
            .policy
            .read("find_credential_by_email", || {
                self.customers.find_credential_by_email(&email)
            })
            .await?;

        let customer = match found {
            Some((customer, hash)) => {
                if !verify_password(&password, &PasswordHashString::new(hash)) {
                    metrics::record_sign_in("invalid_credential");
                    tracing::warn!(customer_id = %customer.customer_id, "Sign-in with wrong password");
                    return Err(ServiceError::InvalidCredential);
                }
                customer
            }
            None => {
                verify_against_dummy(&password);
                metrics::record_sign_in("invalid_credential");
                return Err(ServiceError::InvalidCredential);
            }
        };

        let (token, session) = self.issue_session(&customer);
        self.policy
            .write("insert_session", || self.sessions.insert_session(&session))
            .await?;

        metrics::record_sign_in("success");
        tracing::info!(customer_id = %customer.customer_id, "Customer signed in");

        Ok(AuthenticatedSession { token, customer })
    }

    /// Resolve a bearer token to its customer.
    ///
    /// `Ok(None)` covers every "not signed in" case: malformed, unknown,
    /// expired or revoked tokens. Only store failures are errors.
    pub async fn verify_token(&self, token: &str) -> Result<Option<Customer>, ServiceError> {
        if !looks_like_token(token) {
            return Ok(None);
        }

        let token_hash = hash_token(token);
        let session = self
            .policy
            .read("find_session", || {
                self.sessions.find_session_by_token_hash(&token_hash)
            })
            .await?;

        let Some(session) = session.filter(|s| s.is_valid_at(Utc::now())) else {
            return Ok(None);
        };

        let customer = self
            .policy
            .read("find_customer", || {
                self.customers.find_customer_by_id(session.customer_id)
            })
            .await?;

        Ok(customer)
    }

    /// Like [`verify_token`](Self::verify_token) but an absent or invalid
    /// token is `Unauthenticated`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Customer, ServiceError> {
        let Some(token) = token else {
            return Err(ServiceError::Unauthenticated);
        };
        self.verify_token(token)
            .await?
            .ok_or(ServiceError::Unauthenticated)
    }

    /// Revoke exactly the presented token. Unknown and already revoked
    /// tokens succeed.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, token: &str) -> Result<(), ServiceError> {
        if !looks_like_token(token) {
            return Ok(());
        }

        let token_hash = hash_token(token);
        let revoked = self
            .policy
            .read("revoke_session", || {
                self.sessions.revoke_session(&token_hash, Utc::now())
            })
            .await?;

        if revoked {
            tracing::info!("Session revoked");
        }
        Ok(())
    }

    pub async fn get_profile(&self, token: Option<&str>) -> Result<Customer, ServiceError> {
        self.authenticate(token).await
    }

    /// Only the customer owning `token` can be updated through it.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: Option<&str>,
        update: &ProfileUpdate,
    ) -> Result<Customer, ServiceError> {
        let mut customer = self.authenticate(token).await?;
        customer.apply_profile_update(update);

        self.policy
            .write("update_customer_profile", || {
                self.customers.update_customer_profile(&customer)
            })
            .await?;

        tracing::info!(customer_id = %customer.customer_id, "Customer profile updated");
        Ok(customer)
    }
}
