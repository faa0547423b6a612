use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ProfileUpdate;

/// Omitted fields stay unchanged; an empty string clears the field.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "first_name must be at most 100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 200, message = "company must be at most 200 characters"))]
    pub company: Option<String>,
    #[validate(length(max = 200, message = "job_title must be at most 200 characters"))]
    pub job_title: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            company: req.company,
            job_title: req.job_title,
        }
    }
}
