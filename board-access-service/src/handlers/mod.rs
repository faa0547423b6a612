//! HTTP handlers for the board access service.

pub mod customer;
pub mod customer_auth;
pub mod invitation;
pub mod members;
pub mod metrics;
pub mod portal;
