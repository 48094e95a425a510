#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;

use backoffice_core::{BatchId, BranchId, EmployeeId, Money, OrderId, ProductId, SupplierId};
use backoffice_infra::{
    InMemoryBackoffice, InMemoryReferenceData, InMemoryReturnsStore, InMemoryStockLedger,
    StockOutRequest, TransferRequest,
};
use backoffice_inventory::{Branch, Product};
use backoffice_purchasing::{Supplier, SupplyBatch, SupplyLine};
use backoffice_sales::{OrderLine, ReturnLineRequest, ReturnRequest};

/// In-memory backoffice with two branches, one supplier and one product.
pub struct Fixture {
    pub backoffice: Arc<InMemoryBackoffice>,
    pub ledger: Arc<InMemoryStockLedger>,
    pub returns: Arc<InMemoryReturnsStore>,
    pub reference: Arc<InMemoryReferenceData>,
    pub downtown: BranchId,
    pub airport: BranchId,
    pub supplier: SupplierId,
    pub product: ProductId,
    pub employee: EmployeeId,
}

impl Fixture {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryStockLedger::new());
        let returns = Arc::new(InMemoryReturnsStore::new());
        let reference = Arc::new(InMemoryReferenceData::new());

        let downtown = add_branch(&reference, "Downtown");
        let airport = add_branch(&reference, "Airport");
        let supplier = SupplierId::new();
        reference
            .add_supplier(Supplier {
                id: supplier,
                name: "Northwind Textiles".to_string(),
            })
            .expect("register supplier");

        let backoffice = Arc::new(InMemoryBackoffice::in_memory(
            Arc::clone(&ledger),
            Arc::clone(&returns),
            Arc::clone(&reference),
        ));

        let fixture = Self {
            backoffice,
            ledger,
            returns,
            reference,
            downtown,
            airport,
            supplier,
            product: ProductId::new(),
            employee: EmployeeId::new(),
        };
        fixture.register_product(fixture.product, false);
        fixture
    }

    pub fn register_product(&self, id: ProductId, archived: bool) {
        self.reference.add_product(Product {
            id,
            sku: format!("SKU-{}", &id.to_string()[..8]),
            category: "shirts".to_string(),
            size: Some("M".to_string()),
            color: Some("navy".to_string()),
            price: Money::from_minor(2500),
            archived,
        })
        .expect("register product");
    }

    pub fn new_product(&self) -> ProductId {
        let id = ProductId::new();
        self.register_product(id, false);
        id
    }

    pub fn supply_batch(&self, branch_id: BranchId, lines: &[(ProductId, i64)]) -> SupplyBatch {
        SupplyBatch {
            batch_id: BatchId::new(),
            supplier_id: self.supplier,
            branch_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            lines: lines
                .iter()
                .map(|(product_id, quantity)| SupplyLine {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
            employee_id: Some(self.employee),
            note: None,
        }
    }

    /// Receive `quantity` units of `product_id` at `branch_id`.
    pub async fn seed(&self, product_id: ProductId, branch_id: BranchId, quantity: i64) {
        self.backoffice
            .receive_supply(self.supply_batch(branch_id, &[(product_id, quantity)]))
            .await
            .unwrap();
    }

    pub fn stock_out(&self, branch_id: BranchId, quantity: i64, reason: &str) -> StockOutRequest {
        StockOutRequest {
            product_id: self.product,
            branch_id,
            quantity,
            employee_id: self.employee,
            reason: reason.to_string(),
            batch_id: None,
            note: None,
        }
    }

    pub fn transfer(&self, from: BranchId, to: BranchId, quantity: i64) -> TransferRequest {
        TransferRequest {
            product_id: self.product,
            source_branch_id: from,
            destination_branch_id: to,
            quantity,
            batch_id: None,
            employee_id: Some(self.employee),
            note: None,
        }
    }

    /// Record a paid order line and return its order id.
    pub fn sell(&self, product_id: ProductId, quantity: i64, unit_price_deducted: u64) -> OrderId {
        let order_id = OrderId::new();
        self.returns
            .record_sale([OrderLine::sold(
                order_id,
                product_id,
                quantity,
                Money::from_minor(unit_price_deducted + 500),
                Money::from_minor(unit_price_deducted),
            )])
            .unwrap();
        order_id
    }

    pub fn return_request(
        &self,
        order_id: OrderId,
        customer: &str,
        lines: &[(ProductId, i64)],
    ) -> ReturnRequest {
        ReturnRequest {
            order_id,
            employee_id: self.employee,
            customer_name: customer.to_string(),
            lines: lines
                .iter()
                .map(|(product_id, quantity)| ReturnLineRequest {
                    product_id: *product_id,
                    quantity: *quantity,
                    note: Some("customer changed mind".to_string()),
                })
                .collect(),
        }
    }
}

fn add_branch(reference: &InMemoryReferenceData, name: &str) -> BranchId {
    let id = BranchId::new();
    reference.add_branch(Branch {
        id,
        name: name.to_string(),
        address: format!("{name} Mall"),
    })
    .expect("register branch");
    id
}
