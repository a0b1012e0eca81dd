use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::TokenKeys;
use crate::error::ApiError;

/// Identity attached to a request by a verified bearer token. Verification
/// runs to completion before the handler body; a rejected request never
/// reaches the handler.
#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = TokenKeys::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated("missing bearer token"))?;

        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser {
                user_id: claims.sub,
                email: claims.email,
            }),
            Err(e) => {
                warn!(error = %e, "bearer token rejected");
                Err(ApiError::Forbidden("invalid or expired token"))
            }
        }
    }
}
