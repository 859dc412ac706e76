use anyhow::Context;
use serde::Deserialize;

/// Signing configuration for session tokens. The secret is injected here
/// once at startup and handed to `SessionKeys`; nothing below the config
/// layer reads the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub session_ttl_days: i64,
}

/// How the session token travels between server and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Bearer,
    Cookie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub transport: TransportMode,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        // A missing signing secret is a fatal configuration error; refuse to
        // boot rather than fail on the first login.
        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt = JwtConfig {
            secret,
            session_ttl_days: std::env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        let transport = match std::env::var("SESSION_TRANSPORT").as_deref() {
            Ok("cookie") => TransportMode::Cookie,
            _ => TransportMode::Bearer,
        };
        Ok(Self {
            database_url,
            jwt,
            transport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_mode_deserializes_lowercase() {
        let mode: TransportMode = serde_json::from_str("\"cookie\"").unwrap();
        assert_eq!(mode, TransportMode::Cookie);
    }
}
