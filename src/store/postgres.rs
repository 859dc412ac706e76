use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use super::{normalize_email, CredentialStore, QuickToken, StoreError, TokenPurpose, User};

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return StoreError::DuplicateEmail;
        }
    }
    error!(error = %e, "credential store query failed");
    StoreError::Backend(e.into())
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, nome, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, nome, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        nome: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let email = normalize_email(email);
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, nome, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, nome, password_hash, created_at
            "#,
        )
        .bind(&email)
        .bind(nome)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        new_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE id = $1"#)
            .bind(user_id)
            .bind(new_hash)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn create_quick_token(
        &self,
        user_id: Uuid,
        token: &str,
        purpose: TokenPurpose,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quick_tokens (token, user_id, purpose, expires_at, used)
            VALUES ($1, $2, $3, $4, FALSE)
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(purpose)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_quick_token(&self, token: &str) -> Result<Option<QuickToken>, StoreError> {
        let record = sqlx::query_as::<_, QuickToken>(
            r#"
            SELECT token, user_id, purpose, expires_at, used
            FROM quick_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(record)
    }

    async fn mark_quick_token_used(&self, token: &str) -> Result<bool, StoreError> {
        // Compare-and-swap: of any number of concurrent redemptions,
        // exactly one sees a row updated.
        let result = sqlx::query(
            r#"
            UPDATE quick_tokens
            SET used = TRUE
            WHERE token = $1 AND used = FALSE
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }
}
