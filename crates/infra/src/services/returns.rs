use chrono::Utc;
use tracing::{info, instrument, warn};

use backoffice_core::{CreditId, Money, OrderId, ProductId};
use backoffice_sales::{OrderLine, ReturnNote, ReturnOutcome, ReturnRequest, StoreCredit};

use super::ServiceError;
use crate::returns_store::ReturnsStore;

/// Returns & Credit Reconciler.
///
/// A return request is all-or-nothing: every line is validated against the
/// order before anything is written, and the credit update is part of the
/// same atomic unit.
#[derive(Debug, Clone)]
pub struct ReturnsReconciler<S> {
    store: S,
}

impl<S> ReturnsReconciler<S>
where
    S: ReturnsStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, request),
        fields(order_id = %request.order_id, lines = request.lines.len()),
        err
    )]
    pub async fn process(&self, request: ReturnRequest) -> Result<ReturnOutcome, ServiceError> {
        request.validate()?;

        match self.store.settle_return(&request, Utc::now()).await {
            Ok(settlement) => {
                info!(
                    order_id = %request.order_id,
                    credit_id = %settlement.credit.id,
                    total_credit_amount = %settlement.total_credit_amount,
                    credit_opened = settlement.credit_opened,
                    "return processed"
                );
                Ok(ReturnOutcome::from_settlement(&settlement))
            }
            Err(err) => {
                let err = ServiceError::from(err);
                warn!(order_id = %request.order_id, code = err.code(), error = %err, "return rejected");
                Err(err)
            }
        }
    }

    pub async fn active_credits(&self) -> Result<Vec<StoreCredit>, ServiceError> {
        Ok(self.store.active_credits().await?)
    }

    pub async fn credit(&self, id: CreditId) -> Result<StoreCredit, ServiceError> {
        self.store
            .credit(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("store credit {id}")))
    }

    #[instrument(skip(self), fields(credit_id = %id, amount = %amount), err)]
    pub async fn redeem_credit(&self, id: CreditId, amount: Money) -> Result<StoreCredit, ServiceError> {
        let credit = self.store.redeem_credit(id, amount, Utc::now()).await?;
        info!(credit_id = %id, balance = %credit.credit_amount, status = credit.status.as_str(), "store credit redeemed");
        Ok(credit)
    }

    #[instrument(skip(self), fields(credit_id = %id), err)]
    pub async fn void_credit(&self, id: CreditId) -> Result<StoreCredit, ServiceError> {
        let credit = self.store.void_credit(id, Utc::now()).await?;
        info!(credit_id = %id, "store credit voided");
        Ok(credit)
    }

    pub async fn order_line(&self, order_id: OrderId, product_id: ProductId) -> Result<OrderLine, ServiceError> {
        self.store
            .order_line(order_id, product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("product {product_id} was not sold on order {order_id}"))
            })
    }

    pub async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, ServiceError> {
        Ok(self.store.return_notes(order_id).await?)
    }
}
