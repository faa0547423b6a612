use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use service_core::error::AppError;
use tracing::instrument;
use validator::ValidateEmail;

use crate::dtos::customer_auth::{ActionResponse, CustomerAuthRequest, MembershipView};
use crate::models::{CustomerProfile, CustomerView};
use crate::services::ServiceError;
use crate::utils::Password;
use crate::AppState;

/// Single action endpoint used by the customer portal.
#[utoipa::path(
    post,
    path = "/customer-auth",
    request_body = CustomerAuthRequest,
    responses(
        (status = 200, description = "Action succeeded", body = ActionResponse),
        (status = 400, description = "Malformed request or unknown action", body = ActionResponse),
        (status = 401, description = "Invalid credentials or session", body = ActionResponse),
        (status = 404, description = "Invitation not found", body = ActionResponse),
        (status = 409, description = "Email already registered or invitation already accepted", body = ActionResponse),
        (status = 410, description = "Invitation expired", body = ActionResponse),
        (status = 422, description = "Password or email rejected", body = ActionResponse),
        (status = 429, description = "Too many requests", body = ActionResponse),
        (status = 503, description = "Store unavailable", body = ActionResponse)
    ),
    tag = "Customer Authentication"
)]
#[instrument(skip_all, fields(action = tracing::field::Empty))]
pub async fn customer_auth(
    State(state): State<AppState>,
    payload: Result<Json<CustomerAuthRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected customer auth payload");
            return ActionResponse::from_app_error(AppError::BadRequest(anyhow::anyhow!(
                "Invalid request: {}",
                rejection.body_text()
            )));
        }
    };

    let action = request.action();
    tracing::Span::current().record("action", action);

    match dispatch(&state, request).await {
        Ok(response) => response.ok(),
        Err(err) => {
            tracing::info!(action, error = %err, "Customer auth action rejected");
            ActionResponse::failure(err)
        }
    }
}

async fn dispatch(
    state: &AppState,
    request: CustomerAuthRequest,
) -> Result<ActionResponse, ServiceError> {
    match request {
        CustomerAuthRequest::Register {
            email,
            password,
            first_name,
            last_name,
            company,
            job_title,
        } => {
            if !email.trim().validate_email() {
                return Err(ServiceError::Validation("Invalid email format".to_string()));
            }
            let profile = CustomerProfile {
                first_name,
                last_name,
                company,
                job_title,
            };
            let session = state
                .sessions
                .sign_up(&email, Password::new(password), profile)
                .await?;
            Ok(ActionResponse {
                token: Some(session.token),
                user: Some(CustomerView::from(session.customer)),
                ..Default::default()
            })
        }
        CustomerAuthRequest::Login { email, password } => {
            let session = state
                .sessions
                .sign_in(&email, Password::new(password))
                .await?;
            Ok(ActionResponse {
                token: Some(session.token),
                user: Some(CustomerView::from(session.customer)),
                ..Default::default()
            })
        }
        CustomerAuthRequest::Logout { token } => {
            state.sessions.sign_out(&token).await?;
            Ok(ActionResponse::default())
        }
        CustomerAuthRequest::VerifyToken { token } => {
            let customer = state
                .sessions
                .verify_token(&token)
                .await?
                .ok_or(ServiceError::Unauthenticated)?;
            Ok(ActionResponse {
                user: Some(CustomerView::from(customer)),
                ..Default::default()
            })
        }
        CustomerAuthRequest::AcceptInvitation {
            invitation_token,
            session_token,
        } => {
            let accepted = state
                .invitations
                .accept_invitation(&invitation_token, &session_token)
                .await?;
            Ok(ActionResponse {
                membership: Some(MembershipView::from(accepted.membership)),
                ..Default::default()
            })
        }
    }
}
