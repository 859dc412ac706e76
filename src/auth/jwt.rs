use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::config::JwtConfig;
use crate::store::User;

/// Decoded payload of a session token. Possession of a token carrying
/// these claims is authorization to act as `sub` until `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub nome: String,
    pub iat: usize,
    pub exp: usize,
}

/// Session token codec. Pure function of (claims, secret, clock); the
/// secret is injected at construction, never read from the environment
/// here.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

/// Tolerated clock skew when checking `exp`, in seconds.
const LEEWAY_SECS: u64 = 5;

impl SessionKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::days(config.session_ttl_days),
        }
    }

    pub fn sign(&self, user: &User) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email.clone(),
            nome: user.nome.clone(),
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(e.into()))?;
        debug!(user_id = %user.id, "session token signed");
        Ok(token)
    }

    /// Verify signature, structure and expiry. Only HS256 is accepted;
    /// a token declaring any other algorithm fails outright.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|_| AuthError::InvalidToken)?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }
}
