//! Reference data the ledger reads but never writes.

use serde::{Deserialize, Serialize};

use backoffice_core::{BranchId, Money, ProductId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub address: String,
}

/// Catalog product. Only `id`, `archived` and `price` matter to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub category: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Money,
    pub archived: bool,
}
