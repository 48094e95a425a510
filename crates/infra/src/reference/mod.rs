//! Read access to branches, products and suppliers.
//!
//! This system validates references against them but never writes them; the
//! catalog and branch directory are owned elsewhere.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryReferenceData;
pub use postgres::PostgresReferenceData;

use std::sync::Arc;

use backoffice_core::{BranchId, ProductId, SupplierId};
use backoffice_inventory::{Branch, Product};
use backoffice_purchasing::Supplier;

use crate::error::StoreError;

#[async_trait::async_trait]
pub trait ReferenceData: Send + Sync {
    async fn branch(&self, id: BranchId) -> Result<Option<Branch>, StoreError>;
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;
}

#[async_trait::async_trait]
impl<S> ReferenceData for Arc<S>
where
    S: ReferenceData + ?Sized,
{
    async fn branch(&self, id: BranchId) -> Result<Option<Branch>, StoreError> {
        (**self).branch(id).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id).await
    }

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        (**self).supplier(id).await
    }
}
