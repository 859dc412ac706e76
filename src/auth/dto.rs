use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::User;

/// Request body for signup. Fields are optional so that missing input
/// surfaces as a 400 with a specific message instead of a decode error.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub senha: Option<String>,
}

/// Request body for login. Accepts `password` or the legacy `senha` key.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    #[serde(alias = "senha")]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuickLoginRequest {
    pub token: Option<String>,
}

/// Two-step reset body: step one carries only `email`; step two adds the
/// new `senha` and the possession token from the reset link.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub senha: Option<String>,
    pub token: Option<String>,
}

/// Restricted projection of a user returned to clients. Never carries
/// the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub nome: String,
    pub email: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nome: user.nome,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Response for signup, login and quick login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct QuickTokenResponse {
    pub ok: bool,
    pub token: String,
    #[serde(rename = "expiresAt", with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: Option<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetLookupResponse {
    pub ok: bool,
    pub found: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetAppliedResponse {
    pub ok: bool,
    pub updated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_leaks_the_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ana@x.com".into(),
            nome: "Ana".into(),
            password_hash: "super-hash".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("super-hash"));
        assert!(json.contains("createdAt"));
    }

    #[test]
    fn login_request_accepts_senha_alias() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.com","senha":"segredo1"}"#).unwrap();
        assert_eq!(req.password.as_deref(), Some("segredo1"));
    }
}
