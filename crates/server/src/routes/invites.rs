use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use service::referral::domain::{AcceptOutcome, DistributionReport, Invite};

use crate::errors::JsonApiError;
use crate::routes::auth::{Caller, ServerState};

#[derive(Debug, Deserialize)]
pub struct CreateInviteInput {
    pub recruiter_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteInput {
    pub user_id: Uuid,
}

#[utoipa::path(
    post, path = "/invites", tag = "invites",
    request_body = crate::openapi::CreateInviteRequest,
    responses(
        (status = 201, description = "Created"),
        (status = 400, description = "Validation Error"),
        (status = 404, description = "Unknown recruiter")
    )
)]
pub async fn create(State(state): State<ServerState>, Json(input): Json<CreateInviteInput>) -> Result<(StatusCode, Json<Invite>), JsonApiError> {
    let invite = state.service.create_invite(input.recruiter_id, &input.email).await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

#[utoipa::path(
    post, path = "/invites/{id}/accept", tag = "invites",
    params(("id" = Uuid, Path, description = "Invite id")),
    request_body = crate::openapi::AcceptInviteRequest,
    responses(
        (status = 200, description = "Accepted and fully distributed"),
        (status = 500, description = "Accepted, but some levels failed; `report` lists them for reconcile"),
        (status = 400, description = "Invite not pending or invalid acceptor"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn accept(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AcceptInviteInput>,
) -> Result<Json<AcceptOutcome>, JsonApiError> {
    let outcome = state.service.accept_invite(id, input.user_id).await?;
    info!(invite_id = %id, awarded = outcome.distribution.total_awarded(), "invite_accept_request");
    Ok(Json(outcome))
}

#[utoipa::path(
    post, path = "/invites/{id}/reconcile", tag = "admin",
    params(("id" = Uuid, Path, description = "Invite id")),
    responses(
        (status = 200, description = "All levels recorded"),
        (status = 500, description = "Some levels still failing; `report` lists them"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer" = []))
)]
pub async fn reconcile(State(state): State<ServerState>, Caller(caller): Caller, Path(id): Path<Uuid>) -> Result<Json<DistributionReport>, JsonApiError> {
    Ok(Json(state.service.reconcile_invite(caller, id).await?))
}
