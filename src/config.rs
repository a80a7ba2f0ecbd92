//! Environment-driven configuration.

use anyhow::{bail, Context};
use chrono::Duration;
use std::env;

const DEV_JWT_SECRET: &str = "storefront-development-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub nats_url: Option<String>,
    /// Staff account created at startup when missing.
    pub superuser: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            database_url: None,
            db_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_ttl: Duration::days(1),
            refresh_ttl: Duration::days(1),
            nats_url: None,
            superuser: None,
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the process environment; call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if database_url.is_some() => bail!("JWT_SECRET must be set when DATABASE_URL is configured"),
            _ => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                defaults.jwt_secret.clone()
            }
        };
        let superuser = match (env::var("SUPERUSER_USERNAME"), env::var("SUPERUSER_PASSWORD")) {
            (Ok(user), Ok(password)) if !user.is_empty() && !password.is_empty() => Some((user, password)),
            _ => None,
        };

        let config = Self {
            port: parsed("PORT", defaults.port)?,
            database_url,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            jwt_secret,
            access_ttl: Duration::minutes(parsed("JWT_ACCESS_MINUTES", defaults.access_ttl.num_minutes())?),
            refresh_ttl: Duration::days(parsed("JWT_REFRESH_DAYS", defaults.refresh_ttl.num_days())?),
            nats_url: env::var("NATS_URL").ok().filter(|s| !s.is_empty()),
            superuser,
        };
        tracing::info!(port = config.port, persistent = config.database_url.is_some(), "Configuration loaded");
        Ok(config)
    }
}
