//! JWT authentication middleware and helpers.
//!
//! Provides JWT encoding/decoding plus the `AuthUser` and `AdminUser` Axum
//! extractors. The admin flag travels in the token, so admin checks never hit
//! the database.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskmail_common::error::AppError;
use taskmail_tasks::task::Actor;

use crate::state::AppState;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's UUID
    pub sub: String,
    /// Whether the user is an administrator
    #[serde(default)]
    pub admin: bool,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated user extracted from JWT token.
///
/// Use as an Axum extractor on protected routes:
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     // auth.user_id is the authenticated user's UUID
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub claims: Claims,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            is_admin: self.is_admin,
        }
    }
}

/// Authenticated administrator. Non-admins are rejected with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Encode a JWT token for a user.
pub fn encode_jwt(
    user_id: Uuid,
    admin: bool,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        admin,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))?;

    Ok(token)
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// Validate the `Authorization: Bearer <token>` header.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Auth("Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string())
        })?;

    let claims = decode_jwt(token, secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;

    Ok(AuthUser {
        user_id,
        is_admin: claims.admin,
        claims,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = authenticate(&parts.headers, &state.config.jwt_secret);
        async move { result }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let result = authenticate(&parts.headers, &state.config.jwt_secret).and_then(|auth| {
            if auth.is_admin {
                Ok(AdminUser(auth))
            } else {
                Err(AppError::unauthorized())
            }
        });
        async move { result }
    }
}
