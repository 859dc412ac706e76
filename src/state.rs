use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::SessionKeys;
use crate::auth::transport::SessionTransport;
use crate::config::{AppConfig, JwtConfig, TransportMode};
use crate::store::{CredentialStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub keys: SessionKeys,
    pub transport: SessionTransport,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgStore::new(pool)) as Arc<dyn CredentialStore>;
        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn CredentialStore>, config: Arc<AppConfig>) -> Self {
        let keys = SessionKeys::from_config(&config.jwt);
        let transport = SessionTransport::from(config.transport);
        Self {
            store,
            keys,
            transport,
            config,
        }
    }

    /// State over the in-memory store, for tests.
    pub fn in_memory(transport: TransportMode) -> Self {
        let config = Arc::new(AppConfig {
            database_url: "postgres://unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                session_ttl_days: 7,
            },
            transport,
        });
        let store = Arc::new(MemoryStore::new()) as Arc<dyn CredentialStore>;
        Self::from_parts(store, config)
    }
}
