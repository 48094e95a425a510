//! Configuration loading.
//!
//! Layers, lowest precedence first:
//! 1. defaults in code
//! 2. `config/{environment}.toml` (optional)
//! 3. environment variables, e.g. `BACKOFFICE_DATABASE__URL`
//!
//! A `.env` file in the working directory is loaded before reading the environment.

use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use backoffice_observability::LogSettings;

use crate::error::{map_sqlx_error, StoreError};

#[derive(Debug, Deserialize, Clone)]
pub struct BackofficeConfig {
    /// Current environment (development, production)
    pub environment: String,

    pub database: DatabaseConfig,

    pub logging: LogSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    pub max_connections: u32,

    pub min_connections: u32,

    /// Seconds to wait for a pooled connection before failing.
    pub acquire_timeout_secs: u64,
}

impl BackofficeConfig {
    /// Load configuration from `.env`, files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let environment =
            std::env::var("BACKOFFICE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Self::defaults(&environment)?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("BACKOFFICE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builder holding only the code defaults. `database.url` has none.
    pub fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("logging.json", environment != "development")?
            .set_default("logging.filter", "info")
    }

    pub async fn connect_pool(&self) -> Result<PgPool, StoreError> {
        PgPoolOptions::new()
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
            .connect(&self.database.url)
            .await
            .map_err(|e| map_sqlx_error("connect_pool", e))
    }
}
