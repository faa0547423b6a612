use service_core::error::AppError;
use service_core::retry::Transient;
use thiserror::Error;

use super::store::StoreError;

/// Outcome taxonomy of the session, invitation and access operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("{0}")]
    WeakCredential(String),

    /// Unknown email and wrong password share this variant and message.
    #[error("Invalid email or password")]
    InvalidCredential,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Board not found")]
    BoardNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation has already been accepted")]
    InvitationAlreadyAccepted,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Transient for ServiceError {
    fn is_transient(&self) -> bool {
        matches!(self, ServiceError::StoreUnavailable(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => ServiceError::StoreUnavailable(e),
            StoreError::UniqueViolation(constraint) => ServiceError::Internal(anyhow::anyhow!(
                "Unexpected unique constraint violation: {}",
                constraint
            )),
            StoreError::Backend(e) => ServiceError::Internal(e),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::DuplicateEmail => AppError::Conflict(anyhow::anyhow!(message)),
            ServiceError::WeakCredential(_) => AppError::Unprocessable(anyhow::anyhow!(message)),
            ServiceError::InvalidCredential => AppError::AuthError(anyhow::anyhow!(message)),
            ServiceError::Unauthenticated => AppError::Unauthorized(anyhow::anyhow!(message)),
            ServiceError::BoardNotFound => AppError::NotFound(anyhow::anyhow!(message)),
            ServiceError::InvitationNotFound => AppError::NotFound(anyhow::anyhow!(message)),
            ServiceError::InvitationExpired => AppError::Gone(anyhow::anyhow!(message)),
            ServiceError::InvitationAlreadyAccepted => AppError::Conflict(anyhow::anyhow!(message)),
            ServiceError::StoreUnavailable(e) => {
                tracing::warn!(error = %e, "Backing store unavailable");
                AppError::ServiceUnavailable
            }
            ServiceError::Forbidden(_) => AppError::Forbidden(anyhow::anyhow!(message)),
            ServiceError::Validation(msg) => AppError::Unprocessable(anyhow::anyhow!(msg)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
