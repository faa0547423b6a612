pub mod password;
pub mod token;
pub mod validation;

pub use password::{hash_password, verify_against_dummy, verify_password, Password, PasswordHashString};
pub use token::{generate_token, hash_token, looks_like_token};
pub use validation::ValidatedJson;
