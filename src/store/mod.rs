use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub nome: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// What a quick token may be exchanged for. A token is only redeemable
/// for the purpose it was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    QuickLogin,
    PasswordReset,
}

/// Single-use token record. Redeemable iff `!used && now < expires_at`.
#[derive(Debug, Clone, FromRow)]
pub struct QuickToken {
    pub token: String,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub expires_at: OffsetDateTime,
    pub used: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence boundary for users and quick tokens.
///
/// Uniqueness of email and single-use of quick tokens are enforced here
/// with atomic primitives (unique index, compare-and-swap on `used`);
/// callers never serialize concurrent requests themselves.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Lookup by email. The address is lowercased before matching.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Fails with [`StoreError::DuplicateEmail`] when the
    /// normalized email is already taken; the unique constraint is the
    /// source of truth, there is no check-then-create window.
    async fn create_user(
        &self,
        email: &str,
        nome: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn update_password_hash(&self, user_id: Uuid, new_hash: &str)
        -> Result<(), StoreError>;

    async fn create_quick_token(
        &self,
        user_id: Uuid,
        token: &str,
        purpose: TokenPurpose,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    async fn find_quick_token(&self, token: &str) -> Result<Option<QuickToken>, StoreError>;

    /// Flip `used` to true. Returns `false` when the token was already
    /// consumed (or does not exist) — the swap is atomic, so concurrent
    /// redemptions see exactly one `true`.
    async fn mark_quick_token_used(&self, token: &str) -> Result<bool, StoreError>;
}

/// Lowercase the address before any storage or lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_email("  Ana@X.Com "), "ana@x.com");
    }

    #[test]
    fn user_serialization_skips_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ana@x.com".into(),
            nome: "Ana".into(),
            password_hash: "secret-hash".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("ana@x.com"));
    }
}
