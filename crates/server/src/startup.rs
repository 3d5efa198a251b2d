use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::AppConfig;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use service::referral::{repo::SeaOrmReferralRepository, ReferralService};

use crate::errors::StartupError;
use crate::routes::{self, auth};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Initialize logging via shared common utils; a no-op if the binary already did
fn init_logging() {
    init_logging_from_env();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Router over an already constructed service; used by `run` and the HTTP tests.
pub fn build_app(service: Arc<ReferralService>, jwt_secret: String, public_url: String) -> Router {
    let state = auth::ServerState { service, auth: auth::ServerAuthConfig { jwt_secret }, public_url };
    routes::build_router(state, build_cors())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(event = "shutdown_signal", "received Ctrl+C, draining connections");
    }
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = AppConfig::load_or_env().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;

    let db = models::db::connect_with_config(&cfg.database)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;
    if cfg.database.run_migrations {
        migration::Migrator::up(&db, None).await.map_err(|e| StartupError::Database(e.to_string()))?;
        info!(event = "migrations_applied", "database schema up to date");
    }

    let jwt_secret = if cfg.auth.jwt_secret.trim().is_empty() {
        warn!("auth.jwt_secret and JWT_SECRET unset, using the development secret");
        DEV_JWT_SECRET.to_string()
    } else {
        cfg.auth.jwt_secret.clone()
    };

    let repo = Arc::new(SeaOrmReferralRepository::new(db));
    let service = Arc::new(ReferralService::new(repo, cfg.referral.clone()));
    let app = build_app(service, jwt_secret, cfg.server.public_base_url());

    let addr = bind_addr(&cfg)?;
    info!(%addr, base_award = cfg.referral.base_award, max_depth = cfg.referral.max_depth, "starting referral server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!(event = "stop", "server stopped");
    Ok(())
}
