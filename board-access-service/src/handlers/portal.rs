use axum::extract::{Path, State};
use service_core::error::AppError;
use tracing::instrument;

use crate::dtos::access::PortalAccessResponse;
use crate::middleware::SessionToken;
use crate::AppState;

/// Gate a visit to a board's portal URL.
#[utoipa::path(
    get,
    path = "/portal/{organization}/{board_slug}",
    params(
        ("organization" = String, Path, description = "Organization slug"),
        ("board_slug" = String, Path, description = "Board slug")
    ),
    responses(
        (status = 200, description = "Visitor may view the board", body = PortalAccessResponse),
        (status = 401, description = "Sign-in or invitation required", body = PortalAccessResponse),
        (status = 404, description = "No such board", body = PortalAccessResponse),
        (status = 503, description = "Store unavailable", body = crate::dtos::ErrorResponse)
    ),
    security((), ("bearer_auth" = [])),
    tag = "Access"
)]
#[instrument(skip_all, fields(organization = %organization, board = %board_slug))]
pub async fn portal_access(
    State(state): State<AppState>,
    Path((organization, board_slug)): Path<(String, String)>,
    session: SessionToken,
) -> Result<PortalAccessResponse, AppError> {
    let decision = state
        .gate
        .resolve_slug(&organization, &board_slug, session.as_deref())
        .await?;
    Ok(PortalAccessResponse::from(decision))
}
