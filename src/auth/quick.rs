use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::store::{CredentialStore, StoreError, TokenPurpose, User};

/// Entropy of a freshly issued token, before base64url encoding.
const TOKEN_BYTES: usize = 24;

const QUICK_LOGIN_TTL: Duration = Duration::minutes(5);
const PASSWORD_RESET_TTL: Duration = Duration::minutes(30);

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("token not found")]
    NotFound,
    #[error("token already used")]
    AlreadyUsed,
    #[error("token expired")]
    Expired,
    #[error("token owner not found")]
    UserNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RedeemError> for AuthError {
    fn from(e: RedeemError) -> Self {
        match e {
            RedeemError::NotFound => AuthError::TokenNotFound,
            RedeemError::AlreadyUsed => AuthError::TokenUsed,
            RedeemError::Expired => AuthError::TokenExpired,
            RedeemError::UserNotFound => AuthError::UserNotFound,
            RedeemError::Store(e) => e.into(),
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn ttl_for(purpose: TokenPurpose) -> Duration {
    match purpose {
        TokenPurpose::QuickLogin => QUICK_LOGIN_TTL,
        TokenPurpose::PasswordReset => PASSWORD_RESET_TTL,
    }
}

/// Issue a single-use token bound to `user_id`. The caller is expected
/// to be authenticated already; that is the handler layer's job.
pub async fn issue(
    store: &dyn CredentialStore,
    user_id: Uuid,
    purpose: TokenPurpose,
) -> Result<IssuedToken, StoreError> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl_for(purpose);
    store
        .create_quick_token(user_id, &token, purpose, expires_at)
        .await?;
    info!(user_id = %user_id, purpose = ?purpose, "quick token issued");
    Ok(IssuedToken { token, expires_at })
}

/// Exchange a token exactly once for its owning user.
///
/// Checks run in a fixed order for deterministic errors: existence,
/// used flag, expiry. The used flag is consumed before the user is
/// loaded, so a failure past that point still burns the token
/// (fail-closed single use). A token issued for another purpose is
/// reported as not found.
pub async fn redeem(
    store: &dyn CredentialStore,
    token: &str,
    purpose: TokenPurpose,
) -> Result<User, RedeemError> {
    redeem_at(store, token, purpose, OffsetDateTime::now_utc()).await
}

async fn redeem_at(
    store: &dyn CredentialStore,
    token: &str,
    purpose: TokenPurpose,
    now: OffsetDateTime,
) -> Result<User, RedeemError> {
    let record = store
        .find_quick_token(token)
        .await?
        .ok_or(RedeemError::NotFound)?;
    if record.purpose != purpose {
        return Err(RedeemError::NotFound);
    }
    if record.used {
        return Err(RedeemError::AlreadyUsed);
    }
    if now >= record.expires_at {
        return Err(RedeemError::Expired);
    }

    // The store's compare-and-swap is authoritative; a concurrent
    // redemption that won the race surfaces here as AlreadyUsed.
    if !store.mark_quick_token_used(token).await? {
        return Err(RedeemError::AlreadyUsed);
    }

    let user = store
        .find_user_by_id(record.user_id)
        .await?
        .ok_or(RedeemError::UserNotFound)?;
    info!(user_id = %user.id, purpose = ?purpose, "quick token redeemed");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user("ana@x.com", "Ana", "hash")
            .await
            .unwrap();
        (store, user)
    }

    #[test]
    fn generated_tokens_are_url_safe_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 24 bytes -> 32 base64url chars, no padding
        assert_eq!(a.len(), 32);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn issue_then_redeem_returns_owner() {
        let (store, user) = store_with_user().await;
        let issued = issue(&store, user.id, TokenPurpose::QuickLogin)
            .await
            .unwrap();
        let redeemed = redeem(&store, &issued.token, TokenPurpose::QuickLogin)
            .await
            .unwrap();
        assert_eq!(redeemed.id, user.id);
    }

    #[tokio::test]
    async fn second_redemption_fails_already_used() {
        let (store, user) = store_with_user().await;
        let issued = issue(&store, user.id, TokenPurpose::QuickLogin)
            .await
            .unwrap();
        redeem(&store, &issued.token, TokenPurpose::QuickLogin)
            .await
            .unwrap();
        let err = redeem(&store, &issued.token, TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::AlreadyUsed));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (store, _) = store_with_user().await;
        let err = redeem(&store, "nope", TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::NotFound));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_but_fresh_one_is_not() {
        let (store, user) = store_with_user().await;
        let now = OffsetDateTime::now_utc();

        store
            .create_quick_token(user.id, "stale", TokenPurpose::QuickLogin, now - Duration::seconds(1))
            .await
            .unwrap();
        let err = redeem(&store, "stale", TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Expired));

        store
            .create_quick_token(user.id, "fresh", TokenPurpose::QuickLogin, now + Duration::seconds(59))
            .await
            .unwrap();
        assert!(redeem(&store, "fresh", TokenPurpose::QuickLogin).await.is_ok());
    }

    #[tokio::test]
    async fn quick_login_ttl_is_five_minutes_with_a_sharp_edge() {
        let (store, user) = store_with_user().await;
        let before = OffsetDateTime::now_utc();
        let issued = issue(&store, user.id, TokenPurpose::QuickLogin)
            .await
            .unwrap();
        let elapsed = issued.expires_at - before;
        assert!(elapsed >= Duration::minutes(5));
        assert!(elapsed < Duration::minutes(5) + Duration::seconds(2));

        // One second past expiry, and expiry itself, are both too late;
        // one second before is still good. Failed expiry checks do not
        // consume the token, so one token covers all three cases.
        let err = redeem_at(
            &store,
            &issued.token,
            TokenPurpose::QuickLogin,
            issued.expires_at + Duration::seconds(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RedeemError::Expired));

        let err = redeem_at(&store, &issued.token, TokenPurpose::QuickLogin, issued.expires_at)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Expired));

        let redeemed = redeem_at(
            &store,
            &issued.token,
            TokenPurpose::QuickLogin,
            issued.expires_at - Duration::seconds(1),
        )
        .await
        .unwrap();
        assert_eq!(redeemed.id, user.id);
    }

    #[tokio::test]
    async fn used_wins_over_expired_in_error_ordering() {
        let (store, user) = store_with_user().await;
        let now = OffsetDateTime::now_utc();
        store
            .create_quick_token(user.id, "both", TokenPurpose::QuickLogin, now - Duration::minutes(1))
            .await
            .unwrap();
        store.mark_quick_token_used("both").await.unwrap();
        let err = redeem(&store, "both", TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::AlreadyUsed));
    }

    #[tokio::test]
    async fn token_is_bound_to_its_purpose() {
        let (store, user) = store_with_user().await;
        let issued = issue(&store, user.id, TokenPurpose::PasswordReset)
            .await
            .unwrap();
        let err = redeem(&store, &issued.token, TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::NotFound));
    }

    #[tokio::test]
    async fn redemption_burns_the_token_even_when_the_user_is_gone() {
        let store = MemoryStore::new();
        let orphan = Uuid::new_v4();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(5);
        store
            .create_quick_token(orphan, "orphan", TokenPurpose::QuickLogin, expires)
            .await
            .unwrap();

        let err = redeem(&store, "orphan", TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::UserNotFound));

        // Fail-closed: the failed redemption still consumed the token.
        let err = redeem(&store, "orphan", TokenPurpose::QuickLogin)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::AlreadyUsed));
    }
}
