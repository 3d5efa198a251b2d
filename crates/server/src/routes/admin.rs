use axum::{extract::{Path, State}, Json};
use uuid::Uuid;

use service::referral::domain::User;

use crate::errors::JsonApiError;
use crate::routes::auth::{Caller, ServerState};

#[utoipa::path(
    get, path = "/admin/recruiters", tag = "admin",
    responses((status = 200, description = "All recruiters"), (status = 401, description = "Unauthorized"), (status = 403, description = "Forbidden")),
    security(("bearer" = []))
)]
pub async fn list_recruiters(State(state): State<ServerState>, Caller(caller): Caller) -> Result<Json<Vec<User>>, JsonApiError> {
    state.service.require_admin(caller).await?;
    Ok(Json(state.service.list_recruiters().await?))
}

#[utoipa::path(
    post, path = "/admin/users/{id}/promote", tag = "admin",
    params(("id" = Uuid, Path, description = "User to promote")),
    responses(
        (status = 200, description = "Promoted to root recruiter"),
        (status = 400, description = "Target cannot be promoted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer" = []))
)]
pub async fn promote(State(state): State<ServerState>, Caller(caller): Caller, Path(id): Path<Uuid>) -> Result<Json<User>, JsonApiError> {
    Ok(Json(state.service.promote_to_recruiter(caller, id).await?))
}
