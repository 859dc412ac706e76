use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MeResponse, OkResponse, PublicUser, QuickLoginRequest,
            QuickTokenResponse, ResetAppliedResponse, ResetLookupResponse, ResetPasswordRequest,
            SignupRequest,
        },
        error::AuthError,
        extractors::Session,
        password::{hash_password, verify_password},
        quick,
    },
    state::AppState,
    store::{normalize_email, TokenPurpose, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/quick-token", post(create_quick_token))
        .route("/auth/login/quick", post(login_quick))
        .route("/auth/reset-password", post(reset_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn session_response(
    state: &AppState,
    user: User,
    status: StatusCode,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let token = state.keys.sign(&user)?;
    let mut headers = HeaderMap::new();
    state.transport.attach(&mut headers, &token);
    Ok((
        status,
        headers,
        Json(AuthResponse {
            ok: true,
            token,
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let nome = payload.nome.as_deref().unwrap_or("").trim().to_string();
    if nome.is_empty() {
        return Err(AuthError::Validation("Informe seu nome.".into()));
    }

    let email = normalize_email(payload.email.as_deref().unwrap_or(""));
    if !is_valid_email(&email) {
        warn!(email = %email, "signup with invalid email");
        return Err(AuthError::Validation("E-mail inválido.".into()));
    }

    let senha = payload.senha.as_deref().unwrap_or("");
    // Characters, not bytes: a multibyte password counts per character.
    if senha.chars().count() < 6 {
        return Err(AuthError::Validation(
            "A senha deve ter ao menos 6 caracteres.".into(),
        ));
    }

    let hash = hash_password(senha)?;
    // The store's unique index decides duplicates; no check-then-create.
    let user = state.store.create_user(&email, &nome, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    session_response(&state, user, StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    // Every failure below answers with the same payload so the endpoint
    // is not a user-existence oracle.
    let (email, password) = match (payload.email.as_deref(), payload.password.as_deref()) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (normalize_email(e), p),
        _ => return Err(AuthError::InvalidCredentials),
    };

    let user = match state.store.find_user_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login with unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    session_response(&state, user, StatusCode::OK)
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<OkResponse>) {
    let mut headers = HeaderMap::new();
    state.transport.clear(&mut headers);
    (headers, Json(OkResponse { ok: true }))
}

#[instrument(skip(state, session))]
pub async fn me(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<MeResponse>, AuthError> {
    let user = state.store.find_user_by_id(session.sub).await?;
    Ok(Json(MeResponse {
        ok: true,
        // A token can outlive its user record; report null, not an error.
        user: user.map(PublicUser::from),
    }))
}

#[instrument(skip(state, session))]
pub async fn create_quick_token(
    State(state): State<AppState>,
    Session(session): Session,
) -> Result<Json<QuickTokenResponse>, AuthError> {
    let issued =
        quick::issue(state.store.as_ref(), session.sub, TokenPurpose::QuickLogin).await?;
    Ok(Json(QuickTokenResponse {
        ok: true,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login_quick(
    State(state): State<AppState>,
    Json(payload): Json<QuickLoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let token = match payload.token.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AuthError::TokenMissing),
    };

    let user = quick::redeem(state.store.as_ref(), token, TokenPurpose::QuickLogin).await?;
    session_response(&state, user, StatusCode::OK)
}

/// Two-step password reset.
///
/// Step one (`{email}`) confirms the account and issues a single-use
/// reset token bound to it; delivering that token to the owner (mailed
/// link) is an out-of-band concern. Step two (`{email, senha, token}`)
/// honors the new password only when the token redeems for the same
/// account — knowing an email address alone is not enough to take over
/// the account.
#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<axum::response::Response, AuthError> {
    use axum::response::IntoResponse;

    let email = normalize_email(payload.email.as_deref().unwrap_or(""));
    if !is_valid_email(&email) {
        return Err(AuthError::Validation("E-mail inválido.".into()));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AuthError::EmailNotFound)?;

    let Some(senha) = payload.senha.as_deref().filter(|s| !s.is_empty()) else {
        // Step one: account exists; hand a reset token to delivery.
        let issued =
            quick::issue(state.store.as_ref(), user.id, TokenPurpose::PasswordReset).await?;
        info!(user_id = %user.id, expires_at = %issued.expires_at, "password reset requested");
        return Ok(Json(ResetLookupResponse {
            ok: true,
            found: true,
        })
        .into_response());
    };

    if senha.chars().count() < 6 {
        return Err(AuthError::Validation(
            "A nova senha deve ter ao menos 6 caracteres.".into(),
        ));
    }

    let token = match payload.token.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AuthError::TokenMissing),
    };

    let owner = quick::redeem(state.store.as_ref(), token, TokenPurpose::PasswordReset).await?;
    if owner.id != user.id {
        warn!(user_id = %user.id, "reset token redeemed for a different account");
        return Err(AuthError::InvalidToken);
    }

    let hash = hash_password(senha)?;
    state.store.update_password_hash(user.id, &hash).await?;
    info!(user_id = %user.id, "password updated via reset");

    Ok(Json(ResetAppliedResponse {
        ok: true,
        updated: true,
    })
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("ana@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_junk() {
        assert!(!is_valid_email("ana"));
        assert!(!is_valid_email("ana@"));
        assert!(!is_valid_email("ana@x"));
        assert!(!is_valid_email("ana @x.com"));
    }
}
