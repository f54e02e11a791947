//! Process settings from environment (and `.env` via dotenvy).

use crate::error::ConfigError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::str::FromStr;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub default_page_size: u32,
    /// Cap on requested page sizes; unset means no cap.
    pub max_page_size: Option<u32>,
}

impl Settings {
    /// Load `.env` if present, then read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup` (env var name -> value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::Load("DATABASE_URL is not set".into()))?;
        let max_connections = parse_or(&lookup, "MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let default_page_size = parse_or(&lookup, "DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size = match lookup("MAX_PAGE_SIZE") {
            None => None,
            Some(_) => Some(parse_or(&lookup, "MAX_PAGE_SIZE", 0u32)?),
        };
        if default_page_size == 0 || max_page_size.is_some_and(|m| m < default_page_size) {
            return Err(ConfigError::Load(format!(
                "page sizes out of range: default {} max {:?}",
                default_page_size, max_page_size
            )));
        }
        Ok(Settings {
            database_url,
            max_connections,
            bind_addr,
            default_page_size,
            max_page_size,
        })
    }

    /// Open the shared connection pool.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        tracing::info!(max_connections = self.max_connections, "connecting to database");
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, raw))),
    }
}
