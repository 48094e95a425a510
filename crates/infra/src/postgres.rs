//! Postgres schema management.

use sqlx::PgPool;

use crate::error::StoreError;

/// Apply pending migrations from `crates/infra/migrations`.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
}
