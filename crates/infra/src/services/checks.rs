//! Reference checks shared by the stock services.

use backoffice_core::{BranchId, ProductId, SupplierId};
use backoffice_inventory::{Branch, Product};
use backoffice_purchasing::Supplier;

use super::ServiceError;
use crate::reference::ReferenceData;

pub(crate) async fn require_branch<R>(reference: &R, id: BranchId) -> Result<Branch, ServiceError>
where
    R: ReferenceData + ?Sized,
{
    reference
        .branch(id)
        .await?
        .ok_or_else(|| ServiceError::Validation(format!("unknown branch {id}")))
}

/// Archived products can still leave or move between branches but not be received.
pub(crate) async fn require_product<R>(
    reference: &R,
    id: ProductId,
    allow_archived: bool,
) -> Result<Product, ServiceError>
where
    R: ReferenceData + ?Sized,
{
    let product = reference
        .product(id)
        .await?
        .ok_or_else(|| ServiceError::Validation(format!("unknown product {id}")))?;
    if product.archived && !allow_archived {
        return Err(ServiceError::Validation(format!(
            "product {id} ({}) is archived",
            product.sku
        )));
    }
    Ok(product)
}

pub(crate) async fn require_supplier<R>(reference: &R, id: SupplierId) -> Result<Supplier, ServiceError>
where
    R: ReferenceData + ?Sized,
{
    reference
        .supplier(id)
        .await?
        .ok_or_else(|| ServiceError::Validation(format!("unknown supplier {id}")))
}
