use std::collections::HashMap;
use std::sync::RwLock;

use backoffice_core::{BranchId, ProductId, SupplierId};
use backoffice_inventory::{Branch, Product};
use backoffice_purchasing::Supplier;

use super::ReferenceData;
use crate::error::StoreError;

/// In-memory reference data for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReferenceData {
    branches: RwLock<HashMap<BranchId, Branch>>,
    products: RwLock<HashMap<ProductId, Product>>,
    suppliers: RwLock<HashMap<SupplierId, Supplier>>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_branch(&self, branch: Branch) -> Result<(), StoreError> {
        let mut map = self.branches.write().map_err(|_| StoreError::poisoned())?;
        map.insert(branch.id, branch);
        Ok(())
    }

    pub fn add_product(&self, product: Product) -> Result<(), StoreError> {
        let mut map = self.products.write().map_err(|_| StoreError::poisoned())?;
        map.insert(product.id, product);
        Ok(())
    }

    pub fn add_supplier(&self, supplier: Supplier) -> Result<(), StoreError> {
        let mut map = self.suppliers.write().map_err(|_| StoreError::poisoned())?;
        map.insert(supplier.id, supplier);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReferenceData for InMemoryReferenceData {
    async fn branch(&self, id: BranchId) -> Result<Option<Branch>, StoreError> {
        let map = self.branches.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let map = self.products.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let map = self.suppliers.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }
}
