pub mod access;
pub mod database;
pub mod error;
pub mod invitation;
pub mod memory;
pub mod metrics;
pub mod session;
pub mod store;

pub use access::{AccessDecision, AccessGate, AuthorizedCaller, DenialReason};
pub use database::Database;
pub use error::ServiceError;
pub use invitation::{InvitationManager, IssuedInvitation};
pub use memory::InMemoryStore;
pub use session::{AuthenticatedSession, SessionManager, SessionSettings, MIN_PASSWORD_LENGTH};
pub use store::{
    BoardRegistry, CustomerStore, InvitationStore, MembershipStore, RedeemOutcome, SessionStore,
    StoreError, StorePolicy,
};
