use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use uuid::Uuid;

use service::referral::domain::{DownlineEntry, DownlineNode, Layer, RankedUser, RecruitCounts, User};

use crate::errors::JsonApiError;
use crate::routes::auth::ServerState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LeaderboardQuery {
    /// Defaults to 50, clamped to the configured maximum
    pub limit: Option<u64>,
}

#[utoipa::path(
    get, path = "/users/{id}/upline", tag = "network",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Ancestors, root first"), (status = 404, description = "Not Found"), (status = 500, description = "Corrupt graph"))
)]
pub async fn upline(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<Vec<User>>, JsonApiError> {
    Ok(Json(state.service.get_upline(id).await?))
}

#[utoipa::path(
    get, path = "/users/{id}/downline", tag = "network",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Descendants with level"), (status = 404, description = "Not Found"))
)]
pub async fn downline(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<Vec<DownlineEntry>>, JsonApiError> {
    Ok(Json(state.service.get_downline(id).await?))
}

#[utoipa::path(
    get, path = "/users/{id}/downline/tree", tag = "network",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Nested descendants"), (status = 404, description = "Not Found"))
)]
pub async fn downline_tree(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<Vec<DownlineNode>>, JsonApiError> {
    Ok(Json(state.service.get_downline_tree(id).await?))
}

#[utoipa::path(
    get, path = "/users/{id}/layers", tag = "network",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Depth buckets"), (status = 404, description = "Not Found"))
)]
pub async fn layers(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Layer>>, JsonApiError> {
    Ok(Json(state.service.get_layers(id).await?))
}

#[utoipa::path(
    get, path = "/users/{id}/counts", tag = "network",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Direct and total recruits"), (status = 404, description = "Not Found"))
)]
pub async fn counts(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<RecruitCounts>, JsonApiError> {
    Ok(Json(state.service.get_recruit_counts(id).await?))
}

#[utoipa::path(
    get, path = "/leaderboard", tag = "network",
    params(LeaderboardQuery),
    responses((status = 200, description = "Ranked users"))
)]
pub async fn leaderboard(State(state): State<ServerState>, Query(q): Query<LeaderboardQuery>) -> Result<Json<Vec<RankedUser>>, JsonApiError> {
    Ok(Json(state.service.get_leaderboard(q.limit).await?))
}
