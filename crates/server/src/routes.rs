use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;
use utoipa::OpenApi;

pub mod admin;
pub mod auth;
pub mod invites;
pub mod network;
pub mod users;

use auth::ServerState;

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> (StatusCode, String) {
    common::metrics::encode_metrics()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::openapi::ApiDoc::openapi())
}

/// Build the full application router: public reads, invite workflow and admin routes
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/openapi.json", get(openapi_json));

    let user_routes = Router::new()
        .route("/users", post(users::register))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/upline", get(network::upline))
        .route("/users/:id/downline", get(network::downline))
        .route("/users/:id/downline/tree", get(network::downline_tree))
        .route("/users/:id/layers", get(network::layers))
        .route("/users/:id/counts", get(network::counts))
        .route("/users/:id/transactions", get(users::transactions))
        .route("/users/:id/invites", get(users::invites))
        .route("/referrals/:code", get(users::resolve_code))
        .route("/leaderboard", get(network::leaderboard));

    let invite_routes = Router::new()
        .route("/invites", post(invites::create))
        .route("/invites/:id/accept", post(invites::accept))
        .route("/invites/:id/reconcile", post(invites::reconcile));

    // Bearer-authenticated; role checked by the service
    let admin_routes = Router::new()
        .route("/admin/recruiters", get(admin::list_recruiters))
        .route("/admin/users/:id/promote", post(admin::promote));

    public
        .merge(user_routes)
        .merge(invite_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx at ERROR
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
