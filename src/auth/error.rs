use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Typed auth outcomes, one variant per row of the error taxonomy.
/// Expected failures map explicitly to a status and payload; only
/// `Internal` goes through the generic path, with detail logged
/// server-side and never echoed to the client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    // Unknown email and wrong password are indistinguishable on the wire.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing session token")]
    NoToken,

    #[error("invalid or expired session token")]
    InvalidToken,

    #[error("email already registered")]
    EmailTaken,

    #[error("quick token missing")]
    TokenMissing,

    #[error("quick token not found")]
    TokenNotFound,

    #[error("quick token already used")]
    TokenUsed,

    #[error("quick token expired")]
    TokenExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("email not registered")]
    EmailNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AuthError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "credenciais_invalidas" }),
            ),
            AuthError::NoToken => (StatusCode::UNAUTHORIZED, json!({ "error": "no_token" })),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "token_invalido" }),
            ),
            AuthError::EmailTaken => (
                StatusCode::CONFLICT,
                json!({ "error": "Já existe uma conta com este e-mail." }),
            ),
            AuthError::TokenMissing => {
                (StatusCode::BAD_REQUEST, json!({ "error": "Token ausente" }))
            }
            AuthError::TokenNotFound => {
                (StatusCode::NOT_FOUND, json!({ "error": "Token inválido" }))
            }
            AuthError::TokenUsed => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Token já utilizado" }),
            ),
            AuthError::TokenExpired => {
                (StatusCode::BAD_REQUEST, json!({ "error": "Token expirado" }))
            }
            AuthError::UserNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Usuário não encontrado" }),
            ),
            AuthError::EmailNotFound => {
                (StatusCode::NOT_FOUND, json!({ "ok": false, "found": false }))
            }
            AuthError::Internal(e) => {
                error!(error = %e, "internal error in auth handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "ok": false, "error": "internal_error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err: AuthError = StoreError::DuplicateEmail.into();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[test]
    fn credential_errors_carry_no_account_oracle() {
        // The Display impl must not mention whether the user exists.
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
