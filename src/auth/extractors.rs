use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use crate::auth::error::AuthError;
use crate::auth::jwt::SessionClaims;
use crate::auth::transport::extract_session_token;
use crate::state::AppState;

/// Extracts and verifies the session token, yielding the claims.
/// Rejection is uniform: missing token and invalid token both answer
/// 401, never a panic across the trust boundary.
pub struct Session(pub SessionClaims);

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers).ok_or(AuthError::NoToken)?;
        let claims = state.keys.verify(&token).map_err(|_| {
            warn!("invalid or expired session token");
            AuthError::InvalidToken
        })?;
        Ok(Session(claims))
    }
}
