use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::access::MembersResponse;
use crate::dtos::customer_auth::MembershipView;
use crate::middleware::SessionToken;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/boards/{board_id}/members",
    params(("board_id" = Uuid, Path, description = "Board id")),
    responses(
        (status = 200, description = "Members ordered by join time", body = MembersResponse),
        (status = 401, description = "Not signed in", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Not a member of the board", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Board not found", body = crate::dtos::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Members"
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    session: SessionToken,
) -> Result<Json<MembersResponse>, AppError> {
    let members = state
        .gate
        .list_members(board_id, session.as_deref())
        .await?;

    Ok(Json(MembersResponse {
        board_id,
        members: members.into_iter().map(MembershipView::from).collect(),
    }))
}

/// Revoke a customer's membership. Board admins only; removing a
/// non-member succeeds.
#[utoipa::path(
    delete,
    path = "/boards/{board_id}/members/{customer_id}",
    params(
        ("board_id" = Uuid, Path, description = "Board id"),
        ("customer_id" = Uuid, Path, description = "Customer to remove")
    ),
    responses(
        (status = 204, description = "Membership removed"),
        (status = 401, description = "Not signed in", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Caller is not a board admin", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Board not found", body = crate::dtos::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Members"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Path((board_id, customer_id)): Path<(Uuid, Uuid)>,
    session: SessionToken,
) -> Result<StatusCode, AppError> {
    state
        .gate
        .remove_member(board_id, customer_id, session.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
