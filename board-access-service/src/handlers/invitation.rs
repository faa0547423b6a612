use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::invitation::{
    CreateInvitationRequest, CreateInvitationResponse, InvitationDetailsResponse,
};
use crate::middleware::SessionToken;
use crate::models::Capability;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Invite an email address to a board. Board admins only.
#[utoipa::path(
    post,
    path = "/boards/{board_id}/invitations",
    params(("board_id" = Uuid, Path, description = "Board to invite to")),
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created", body = CreateInvitationResponse),
        (status = 401, description = "Not signed in", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Caller is not a board admin", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Board not found", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Invitations"
)]
#[instrument(skip_all, fields(board_id = %board_id))]
pub async fn create_invitation(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    session: SessionToken,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = state
        .gate
        .require_capability(board_id, session.as_deref(), Capability::InviteMembers)
        .await?;

    let ttl = req
        .expires_in_hours
        .map(Duration::hours)
        .unwrap_or(state.settings.invitation_ttl);

    let issued = state
        .invitations
        .create_invitation(board_id, &req.email, req.role, ttl)
        .await?;

    tracing::info!(
        invitation_id = %issued.invitation.invitation_id,
        invited_by = %caller.customer_id,
        role = %issued.invitation.role,
        "Invitation issued"
    );

    let response = CreateInvitationResponse {
        invitation_id: issued.invitation.invitation_id,
        invite_url: state.settings.invite_url(&issued.token),
        invite_token: issued.token,
        expires_at: issued.invitation.expiry_utc,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Public preview behind an invitation link. The token is the only secret.
#[utoipa::path(
    get,
    path = "/invitations/{token}",
    params(("token" = String, Path, description = "Invitation token from the link")),
    responses(
        (status = 200, description = "Invitation found", body = InvitationDetailsResponse),
        (status = 404, description = "Invitation not found", body = crate::dtos::ErrorResponse)
    ),
    tag = "Invitations"
)]
#[instrument(skip_all)]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationDetailsResponse>, AppError> {
    let invitation = state.invitations.get_invitation(&token).await?;
    Ok(Json(InvitationDetailsResponse::from_invitation(
        &invitation,
        Utc::now(),
    )))
}
