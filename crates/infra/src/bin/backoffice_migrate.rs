//! Applies the database migrations for the configured environment.

use backoffice_infra::{postgres, BackofficeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BackofficeConfig::load()?;
    backoffice_observability::init_with(&config.logging);

    let pool = config.connect_pool().await?;
    postgres::migrate(&pool).await?;

    tracing::info!(environment = %config.environment, "migrations applied");
    Ok(())
}
