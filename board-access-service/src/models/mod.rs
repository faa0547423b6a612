pub mod board;
pub mod customer;
pub mod invitation;
pub mod membership;
pub mod role;
pub mod session;

pub use board::{AccessType, BoardRecord, CustomerBoard};
pub use customer::{normalize_email, Customer, CustomerProfile, CustomerView, ProfileUpdate};
pub use invitation::{AcceptedInvitation, Invitation, InvitationRecord, InvitationState};
pub use membership::{BoardMembership, MembershipRecord};
pub use role::{has_capability, AccessRole, BoardRole, Capability};
pub use session::CustomerSession;
