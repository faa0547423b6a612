pub mod session;

pub use session::{bearer_token, SessionToken};
