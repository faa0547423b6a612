pub mod access;
pub mod customer;
pub mod customer_auth;
pub mod invitation;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Authentication required")]
    pub error: String,
}
