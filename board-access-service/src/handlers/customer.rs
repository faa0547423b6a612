use axum::{extract::State, Json};
use service_core::error::AppError;
use tracing::instrument;

use crate::dtos::customer::UpdateProfileRequest;
use crate::middleware::SessionToken;
use crate::models::{CustomerView, ProfileUpdate};
use crate::utils::ValidatedJson;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/customers/me",
    responses(
        (status = 200, description = "Signed-in customer's profile", body = CustomerView),
        (status = 401, description = "Not signed in", body = crate::dtos::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customer"
)]
#[instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    session: SessionToken,
) -> Result<Json<CustomerView>, AppError> {
    let customer = state.sessions.get_profile(session.as_deref()).await?;
    Ok(Json(CustomerView::from(customer)))
}

#[utoipa::path(
    patch,
    path = "/customers/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = CustomerView),
        (status = 401, description = "Not signed in", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Customer"
)]
#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    session: SessionToken,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<CustomerView>, AppError> {
    let update = ProfileUpdate::from(req);
    let customer = state
        .sessions
        .update_profile(session.as_deref(), &update)
        .await?;

    tracing::info!(customer_id = %customer.customer_id, "Customer profile updated");
    Ok(Json(CustomerView::from(customer)))
}
