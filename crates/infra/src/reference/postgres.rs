use sqlx::{PgPool, Row};

use backoffice_core::{BranchId, Money, ProductId, SupplierId};
use backoffice_inventory::{Branch, Product};
use backoffice_purchasing::Supplier;

use super::ReferenceData;
use crate::error::{corrupt, map_sqlx_error, StoreError};

/// Reads the `branches`, `products` and `suppliers` tables.
#[derive(Debug, Clone)]
pub struct PostgresReferenceData {
    pool: PgPool,
}

impl PostgresReferenceData {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReferenceData for PostgresReferenceData {
    async fn branch(&self, id: BranchId) -> Result<Option<Branch>, StoreError> {
        let row = sqlx::query("SELECT id, name, address FROM branches WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("branch", e))?;

        let Some(row) = row else { return Ok(None) };
        let get = |e: sqlx::Error| map_sqlx_error("branch", e);
        Ok(Some(Branch {
            id,
            name: row.try_get("name").map_err(get)?,
            address: row.try_get("address").map_err(get)?,
        }))
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, sku, category, size, color, price, archived FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        let Some(row) = row else { return Ok(None) };
        let get = |e: sqlx::Error| map_sqlx_error("product", e);
        let price: i64 = row.try_get("price").map_err(get)?;
        Ok(Some(Product {
            id,
            sku: row.try_get("sku").map_err(get)?,
            category: row.try_get("category").map_err(get)?,
            size: row.try_get("size").map_err(get)?,
            color: row.try_get("color").map_err(get)?,
            price: Money::from_i64(price).map_err(|e| corrupt("product", e))?,
            archived: row.try_get("archived").map_err(get)?,
        }))
    }

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM suppliers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("supplier", e))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Supplier {
            id,
            name: row
                .try_get("name")
                .map_err(|e| map_sqlx_error("supplier", e))?,
        }))
    }
}
