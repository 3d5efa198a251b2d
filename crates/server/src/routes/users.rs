use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use service::pagination::Pagination;
use service::referral::domain::{Invite, PointsTransaction, RegisterUserInput, User};

use crate::errors::JsonApiError;
use crate::routes::auth::ServerState;

/// User plus the link they share to recruit
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub referral_link: String,
}

fn view(state: &ServerState, user: User) -> UserView {
    UserView { referral_link: user.referral_link(&state.public_url), user }
}

#[utoipa::path(
    post, path = "/users", tag = "users",
    request_body = crate::openapi::RegisterRequest,
    responses(
        (status = 201, description = "Registered"),
        (status = 400, description = "Validation Error"),
        (status = 404, description = "Unknown referral code")
    )
)]
pub async fn register(State(state): State<ServerState>, Json(input): Json<RegisterUserInput>) -> Result<(StatusCode, Json<UserView>), JsonApiError> {
    let user = state.service.register_user(input).await?;
    info!(user_id = %user.id, "user_register_request");
    Ok((StatusCode::CREATED, Json(view(&state, user))))
}

#[utoipa::path(
    get, path = "/users/{id}", tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "OK"), (status = 404, description = "Not Found"))
)]
pub async fn get_user(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<UserView>, JsonApiError> {
    let user = state.service.get_user(id).await?;
    Ok(Json(view(&state, user)))
}

#[utoipa::path(
    get, path = "/referrals/{code}", tag = "users",
    params(("code" = String, Path, description = "Referral code, case-insensitive")),
    responses((status = 200, description = "Owner of the code"), (status = 404, description = "Not Found"))
)]
pub async fn resolve_code(State(state): State<ServerState>, Path(code): Path<String>) -> Result<Json<UserView>, JsonApiError> {
    let user = state.service.resolve_referral_code(&code).await?;
    Ok(Json(view(&state, user)))
}

#[utoipa::path(
    get, path = "/users/{id}/transactions", tag = "users",
    params(("id" = Uuid, Path, description = "User id"), crate::openapi::PageParams),
    responses((status = 200, description = "Ledger rows, newest first"), (status = 404, description = "Not Found"))
)]
pub async fn transactions(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PointsTransaction>>, JsonApiError> {
    Ok(Json(state.service.list_points_transactions(id, page).await?))
}

#[utoipa::path(
    get, path = "/users/{id}/invites", tag = "users",
    params(("id" = Uuid, Path, description = "Recruiter id")),
    responses((status = 200, description = "Invites sent, newest first"), (status = 404, description = "Not Found"))
)]
pub async fn invites(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Invite>>, JsonApiError> {
    Ok(Json(state.service.list_invites(id).await?))
}
