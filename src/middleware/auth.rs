use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Claims of the externally issued seller token. Token issuance lives with
/// the hosted identity provider; this crate only verifies.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub establishment_id: String,
    pub role: String,
    pub exp: usize,
}

/// The authenticated seller. Row visibility is establishment-scoped: every
/// query filters on `establishment_id`, and `seller_id` is recorded in the
/// audit trail only.
#[derive(Debug, Clone)]
pub struct AuthSeller {
    pub seller_id: Uuid,
    pub establishment_id: Uuid,
    pub role: String,
}

pub fn ensure_role(seller: &AuthSeller, role: &str) -> Result<(), AppError> {
    if seller.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(seller: &AuthSeller) -> Result<(), AppError> {
    ensure_role(seller, "admin")
}

impl<S> FromRequestParts<S> for AuthSeller
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        let seller_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid seller id in token".into()))?;
        let establishment_id = Uuid::parse_str(&decoded.claims.establishment_id)
            .map_err(|_| AppError::BadRequest("Invalid establishment id in token".into()))?;

        Ok(AuthSeller {
            seller_id,
            establishment_id,
            role: decoded.claims.role.clone(),
        })
    }
}
