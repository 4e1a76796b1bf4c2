//! Bearer-token authentication.
//!
//! Identity lives in an upstream service; this backend only validates the
//! signed token and trusts its subject as the requester id. Every
//! ownership-scoped handler takes an explicit [`AuthUser`].

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Create a signed JWT for a user id.
pub fn create_jwt(config: &JwtConfig, user_id: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.expiration_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok(token)
}

/// Decode and validate a JWT, returning the claims.
pub fn decode_jwt(config: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extractor carrying the authenticated requester id.
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let claims = decode_jwt(&state.config.jwt, token).map_err(|e| {
            tracing::debug!("Token validation failed: {:?}", e);
            AppError::Unauthorized
        })?;

        Ok(AuthUser(claims.sub))
    }
}
