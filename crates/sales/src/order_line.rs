use core::str::FromStr;

use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Money, OrderId, ProductId};

/// Order line status lifecycle: `Paid` → `PartiallyReturned` → `Returned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLineStatus {
    Paid,
    PartiallyReturned,
    Returned,
}

impl OrderLineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderLineStatus::Paid => "paid",
            OrderLineStatus::PartiallyReturned => "partially_returned",
            OrderLineStatus::Returned => "returned",
        }
    }
}

impl FromStr for OrderLineStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(OrderLineStatus::Paid),
            "partially_returned" => Ok(OrderLineStatus::PartiallyReturned),
            "returned" => Ok(OrderLineStatus::Returned),
            other => Err(DomainError::validation(format!("unknown order line status '{other}'"))),
        }
    }
}

/// A sold line, owned by the order store.
///
/// The returns flow is the only writer of `returned_quantity` and `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Units originally sold.
    pub quantity: i64,
    pub unit_price: Money,
    /// Unit price after discounts: what the customer actually paid per unit.
    pub unit_price_deducted: Money,
    pub returned_quantity: i64,
    pub status: OrderLineStatus,
}

impl OrderLine {
    /// A freshly sold line with nothing returned yet.
    pub fn sold(
        order_id: OrderId,
        product_id: ProductId,
        quantity: i64,
        unit_price: Money,
        unit_price_deducted: Money,
    ) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            unit_price,
            unit_price_deducted,
            returned_quantity: 0,
            status: OrderLineStatus::Paid,
        }
    }

    /// Units that can still be returned.
    pub fn returnable(&self) -> i64 {
        self.quantity - self.returned_quantity
    }

    /// The line after accepting `quantity` more returned units.
    pub fn record_return(&self, quantity: i64) -> DomainResult<OrderLine> {
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "return quantity must be greater than zero (got {quantity})"
            )));
        }
        let returnable = self.returnable();
        if quantity > returnable {
            return Err(DomainError::over_return(format!(
                "product {} on order {}: requested {quantity}, returnable {returnable}",
                self.product_id, self.order_id
            )));
        }

        let returned_quantity = self.returned_quantity + quantity;
        let status = if returned_quantity == self.quantity {
            OrderLineStatus::Returned
        } else {
            OrderLineStatus::PartiallyReturned
        };

        Ok(OrderLine {
            returned_quantity,
            status,
            ..self.clone()
        })
    }
}
