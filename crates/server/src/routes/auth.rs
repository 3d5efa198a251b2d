use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::{header::AUTHORIZATION, request::Parts}};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service::referral::ReferralService;

use crate::errors::JsonApiError;

#[derive(Clone)]
pub struct ServerAuthConfig {
    pub jwt_secret: String,
}

#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<ReferralService>,
    pub auth: ServerAuthConfig,
    /// Prefix of referral links handed out to users
    pub public_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub exp: usize,
}

/// Sign an HS256 token carrying `uid`.
pub fn issue_token(uid: Uuid, secret: &str, ttl: chrono::Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (chrono::Utc::now() + ttl).timestamp() as usize;
    let claims = Claims { uid: uid.to_string(), exp };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    Ok(decode::<Claims>(token, &key, &validation)?.claims)
}

/// Identity of the authenticated caller, from `Authorization: Bearer <jwt>`.
///
/// Role checks are left to the service.
pub struct Caller(pub Uuid);

#[async_trait]
impl FromRequestParts<ServerState> for Caller {
    type Rejection = JsonApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ServerState) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let header = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).ok_or_else(|| {
            tracing::warn!(path = %path, "missing Authorization header");
            JsonApiError::unauthorized("missing Authorization header")
        })?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            tracing::warn!(path = %path, "invalid Authorization format (expect Bearer)");
            JsonApiError::unauthorized("expected a Bearer token")
        })?;
        let claims = verify_token(token, &state.auth.jwt_secret).map_err(|e| {
            tracing::warn!(path = %path, err = %e, "token validation failed");
            JsonApiError::unauthorized("invalid or expired token")
        })?;
        let uid = Uuid::parse_str(&claims.uid).map_err(|_| JsonApiError::unauthorized("token uid is not a uuid"))?;
        Ok(Caller(uid))
    }
}
