use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{normalize_email, CredentialStore, QuickToken, StoreError, TokenPurpose, User};

/// In-memory credential store with the same atomicity guarantees as the
/// Postgres one (the mutex serializes every mutation). Reference
/// implementation, used by unit and integration tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tokens: HashMap<String, QuickToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        nome: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let email = normalize_email(email);
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            nome: nome.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        new_hash: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = new_hash.to_string();
        }
        Ok(())
    }

    async fn create_quick_token(
        &self,
        user_id: Uuid,
        token: &str,
        purpose: TokenPurpose,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.insert(
            token.to_string(),
            QuickToken {
                token: token.to_string(),
                user_id,
                purpose,
                expires_at,
                used: false,
            },
        );
        Ok(())
    }

    async fn find_quick_token(&self, token: &str) -> Result<Option<QuickToken>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tokens.get(token).cloned())
    }

    async fn mark_quick_token_used(&self, token: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.tokens.get_mut(token) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user("A@B.com", "Ana", "h1").await.unwrap();
        let err = store.create_user("a@b.com", "Bia", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn mark_used_succeeds_exactly_once() {
        let store = MemoryStore::new();
        let user = store.create_user("ana@x.com", "Ana", "h").await.unwrap();
        let expires = OffsetDateTime::now_utc() + time::Duration::minutes(5);
        store
            .create_quick_token(user.id, "tok", TokenPurpose::QuickLogin, expires)
            .await
            .unwrap();
        assert!(store.mark_quick_token_used("tok").await.unwrap());
        assert!(!store.mark_quick_token_used("tok").await.unwrap());
    }

    #[tokio::test]
    async fn mark_used_on_unknown_token_is_false() {
        let store = MemoryStore::new();
        assert!(!store.mark_quick_token_used("missing").await.unwrap());
    }
}
