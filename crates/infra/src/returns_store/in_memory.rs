use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use backoffice_core::{CreditId, DomainError, Money, OrderId, ProductId};
use backoffice_sales::{settle, OrderLine, ReturnNote, ReturnRequest, ReturnSettlement, StoreCredit};

use super::ReturnsStore;
use crate::error::{SettlementError, StoreError, WriteError};

#[derive(Debug, Default)]
struct ReturnsState {
    lines: BTreeMap<(OrderId, ProductId), OrderLine>,
    /// Creation order.
    credits: Vec<StoreCredit>,
    notes: Vec<ReturnNote>,
}

impl ReturnsState {
    fn credit_mut(&mut self, id: CreditId) -> Option<&mut StoreCredit> {
        self.credits.iter_mut().find(|c| c.id == id)
    }
}

/// In-memory returns store.
///
/// Intended for tests/dev. Order lines are seeded with [`record_sale`](Self::record_sale)
/// since selling is owned by the POS, not this system.
#[derive(Debug, Default)]
pub struct InMemoryReturnsStore {
    state: Mutex<ReturnsState>,
}

impl InMemoryReturnsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReturnsState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::poisoned())
    }

    /// Register sold lines (replacing any line with the same order and product).
    pub fn record_sale(&self, lines: impl IntoIterator<Item = OrderLine>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for line in lines {
            state.lines.insert((line.order_id, line.product_id), line);
        }
        Ok(())
    }

    fn change_credit(
        &self,
        id: CreditId,
        change: impl FnOnce(&StoreCredit) -> Result<StoreCredit, DomainError>,
    ) -> Result<StoreCredit, SettlementError> {
        let mut state = self.lock()?;
        let credit = state
            .credit_mut(id)
            .ok_or_else(|| WriteError::Rejected(DomainError::not_found(format!("store credit {id}"))))?;
        let next = change(&*credit).map_err(WriteError::Rejected)?;
        *credit = next.clone();
        Ok(next)
    }
}

#[async_trait::async_trait]
impl ReturnsStore for InMemoryReturnsStore {
    async fn order_line(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderLine>, StoreError> {
        Ok(self.lock()?.lines.get(&(order_id, product_id)).cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .lines
            .values()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn settle_return(
        &self,
        request: &ReturnRequest,
        at: DateTime<Utc>,
    ) -> Result<ReturnSettlement, SettlementError> {
        let mut state = self.lock()?;

        let sold: BTreeMap<ProductId, OrderLine> = request
            .product_ids()
            .into_iter()
            .filter_map(|product_id| {
                state
                    .lines
                    .get(&(request.order_id, product_id))
                    .map(|line| (product_id, line.clone()))
            })
            .collect();
        let customer = request.customer();
        let active = state
            .credits
            .iter()
            .find(|c| c.is_active() && c.customer_name == customer);

        let settlement = settle(request, &sold, active, at).map_err(WriteError::Rejected)?;

        for line in &settlement.lines {
            state.lines.insert((line.order_id, line.product_id), line.clone());
        }
        if settlement.credit_opened {
            state.credits.push(settlement.credit.clone());
        } else if let Some(existing) = state.credit_mut(settlement.credit.id) {
            *existing = settlement.credit.clone();
        }
        state.notes.extend(settlement.notes.iter().cloned());

        Ok(settlement)
    }

    async fn credit(&self, id: CreditId) -> Result<Option<StoreCredit>, StoreError> {
        let state = self.lock()?;
        Ok(state.credits.iter().find(|c| c.id == id).cloned())
    }

    async fn active_credits(&self) -> Result<Vec<StoreCredit>, StoreError> {
        let state = self.lock()?;
        Ok(state.credits.iter().filter(|c| c.is_active()).cloned().collect())
    }

    async fn redeem_credit(
        &self,
        id: CreditId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<StoreCredit, SettlementError> {
        self.change_credit(id, |credit| credit.redeem(amount, at))
    }

    async fn void_credit(&self, id: CreditId, at: DateTime<Utc>) -> Result<StoreCredit, SettlementError> {
        self.change_credit(id, |credit| credit.void(at))
    }

    async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .notes
            .iter()
            .filter(|n| n.order_id == order_id)
            .cloned()
            .collect())
    }
}
