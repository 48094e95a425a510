//! Order line, store credit and return note persistence.
//!
//! [`ReturnsStore::settle_return`] is the guarded write of the returns flow:
//! it holds the order's lines and the customer's active credit while
//! [`backoffice_sales::settle`] decides, then persists the settlement atomically.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryReturnsStore;
pub use postgres::PostgresReturnsStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use backoffice_core::{CreditId, Money, OrderId, ProductId};
use backoffice_sales::{OrderLine, ReturnNote, ReturnRequest, ReturnSettlement, StoreCredit};

use crate::error::{SettlementError, StoreError};

#[async_trait::async_trait]
pub trait ReturnsStore: Send + Sync {
    async fn order_line(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderLine>, StoreError>;

    /// Lines of an order, ordered by product.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError>;

    /// Validate and apply a return in one atomic unit.
    async fn settle_return(
        &self,
        request: &ReturnRequest,
        at: DateTime<Utc>,
    ) -> Result<ReturnSettlement, SettlementError>;

    async fn credit(&self, id: CreditId) -> Result<Option<StoreCredit>, StoreError>;

    /// Every active credit, oldest first.
    async fn active_credits(&self) -> Result<Vec<StoreCredit>, StoreError>;

    async fn redeem_credit(
        &self,
        id: CreditId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<StoreCredit, SettlementError>;

    async fn void_credit(&self, id: CreditId, at: DateTime<Utc>) -> Result<StoreCredit, SettlementError>;

    /// Return notes of an order, in the order they were recorded.
    async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, StoreError>;
}

#[async_trait::async_trait]
impl<S> ReturnsStore for Arc<S>
where
    S: ReturnsStore + ?Sized,
{
    async fn order_line(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderLine>, StoreError> {
        (**self).order_line(order_id, product_id).await
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        (**self).order_lines(order_id).await
    }

    async fn settle_return(
        &self,
        request: &ReturnRequest,
        at: DateTime<Utc>,
    ) -> Result<ReturnSettlement, SettlementError> {
        (**self).settle_return(request, at).await
    }

    async fn credit(&self, id: CreditId) -> Result<Option<StoreCredit>, StoreError> {
        (**self).credit(id).await
    }

    async fn active_credits(&self) -> Result<Vec<StoreCredit>, StoreError> {
        (**self).active_credits().await
    }

    async fn redeem_credit(
        &self,
        id: CreditId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<StoreCredit, SettlementError> {
        (**self).redeem_credit(id, amount, at).await
    }

    async fn void_credit(&self, id: CreditId, at: DateTime<Utc>) -> Result<StoreCredit, SettlementError> {
        (**self).void_credit(id, at).await
    }

    async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, StoreError> {
        (**self).return_notes(order_id).await
    }
}
