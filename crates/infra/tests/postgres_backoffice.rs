//! Runs against a real database when `DATABASE_URL` is set; skipped otherwise.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use backoffice_core::{BatchId, BranchId, EmployeeId, Money, OrderId, ProductId, SupplierId};
use backoffice_infra::{
    postgres, PostgresBackoffice, PostgresReturnsStore, ReturnsStore, ServiceError,
    StockOutRequest, TransferRequest,
};
use backoffice_purchasing::{SupplyBatch, SupplyLine};
use backoffice_sales::{OrderLine, ReturnLineRequest, ReturnRequest};

async fn connect() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(12)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    postgres::migrate(&pool).await.expect("apply migrations");
    Some(pool)
}

struct Seeded {
    branches: [BranchId; 2],
    supplier: SupplierId,
    product: ProductId,
}

async fn seed_reference(pool: &PgPool) -> Seeded {
    let branches = [BranchId::new(), BranchId::new()];
    for (i, id) in branches.iter().enumerate() {
        sqlx::query("INSERT INTO branches (id, name, address) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(format!("Branch {i}"))
            .bind("Main Street")
            .execute(pool)
            .await
            .unwrap();
    }
    let supplier = SupplierId::new();
    sqlx::query("INSERT INTO suppliers (id, name) VALUES ($1, $2)")
        .bind(supplier.as_uuid())
        .bind("Northwind Textiles")
        .execute(pool)
        .await
        .unwrap();
    let product = ProductId::new();
    sqlx::query("INSERT INTO products (id, sku, category, price) VALUES ($1, $2, $3, $4)")
        .bind(product.as_uuid())
        .bind(format!("SKU-{product}"))
        .bind("shirts")
        .bind(2500_i64)
        .execute(pool)
        .await
        .unwrap();

    Seeded {
        branches,
        supplier,
        product,
    }
}

fn supply(seeded: &Seeded, quantities: &[i64]) -> SupplyBatch {
    SupplyBatch {
        batch_id: BatchId::new(),
        supplier_id: seeded.supplier,
        branch_id: seeded.branches[0],
        date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        lines: quantities
            .iter()
            .map(|q| SupplyLine {
                product_id: seeded.product,
                quantity: *q,
            })
            .collect(),
        employee_id: None,
        note: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_stock_outs_serialize_on_the_row() {
    let Some(pool) = connect().await else { return };
    let seeded = seed_reference(&pool).await;
    let backoffice = Arc::new(PostgresBackoffice::postgres(pool));

    backoffice.receive_supply(supply(&seeded, &[5])).await.unwrap();

    let employee = EmployeeId::new();
    let mut handles = Vec::new();
    for _ in 0..10 {
        let backoffice = Arc::clone(&backoffice);
        let request = StockOutRequest {
            product_id: seeded.product,
            branch_id: seeded.branches[0],
            quantity: 1,
            employee_id: employee,
            reason: "Sold".to_string(),
            batch_id: None,
            note: None,
        };
        handles.push(tokio::spawn(async move { backoffice.stock_out(request).await }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ServiceError::InsufficientStock(_)) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((ok, insufficient), (5, 5));

    let record = backoffice.get_stock(seeded.product, seeded.branches[0]).await.unwrap();
    assert_eq!(record.quantity, 0);
    assert_eq!(record.version, 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_batch_and_transfer_leave_no_trace() {
    let Some(pool) = connect().await else { return };
    let seeded = seed_reference(&pool).await;
    let backoffice = PostgresBackoffice::postgres(pool);

    let bad = supply(&seeded, &[3, 2, 0]);
    let bad_batch = bad.batch_id;
    assert!(matches!(
        backoffice.receive_supply(bad).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(backoffice.batch_movements(bad_batch).await.unwrap().is_empty());

    backoffice.receive_supply(supply(&seeded, &[3])).await.unwrap();
    let transfer = TransferRequest {
        product_id: seeded.product,
        source_branch_id: seeded.branches[0],
        destination_branch_id: seeded.branches[1],
        quantity: 4,
        batch_id: None,
        employee_id: None,
        note: None,
    };
    assert!(matches!(
        backoffice.transfer_stock(transfer.clone()).await,
        Err(ServiceError::InsufficientStock(_))
    ));
    assert!(backoffice.branch_stock(seeded.branches[1]).await.unwrap().is_empty());

    backoffice
        .transfer_stock(TransferRequest { quantity: 2, ..transfer })
        .await
        .unwrap();
    let total: i64 = backoffice
        .stock_levels(seeded.product)
        .await
        .unwrap()
        .iter()
        .map(|r| r.quantity)
        .sum();
    assert_eq!(total, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn returns_accumulate_credit_and_stop_at_sold_quantity() {
    let Some(pool) = connect().await else { return };
    let seeded = seed_reference(&pool).await;
    let returns = PostgresReturnsStore::new(pool.clone());
    let backoffice = PostgresBackoffice::postgres(pool);

    let customer = format!("Jane {}", OrderId::new());
    let order_id = OrderId::new();
    returns
        .record_sale(&[OrderLine::sold(
            order_id,
            seeded.product,
            5,
            Money::from_minor(120),
            Money::from_minor(100),
        )])
        .await
        .unwrap();

    let request = |quantity: i64| ReturnRequest {
        order_id,
        employee_id: EmployeeId::new(),
        customer_name: customer.clone(),
        lines: vec![ReturnLineRequest {
            product_id: seeded.product,
            quantity,
            note: None,
        }],
    };

    let first = backoffice.process_return(request(3)).await.unwrap();
    assert_eq!(first.total_credit_amount, Money::from_minor(300));
    assert!(matches!(
        backoffice.process_return(request(3)).await,
        Err(ServiceError::OverReturn(_))
    ));
    let second = backoffice.process_return(request(2)).await.unwrap();
    assert_eq!(second.credit_id, first.credit_id);

    let credit = backoffice.credit(first.credit_id).await.unwrap();
    assert_eq!(credit.credit_amount, Money::from_minor(500));
    let line = returns.order_line(order_id, seeded.product).await.unwrap().unwrap();
    assert_eq!(line.returned_quantity, 5);
    assert_eq!(returns.return_notes(order_id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn racing_first_returns_keep_one_active_credit() {
    let Some(pool) = connect().await else { return };
    let seeded = seed_reference(&pool).await;
    let returns = PostgresReturnsStore::new(pool.clone());
    let backoffice = Arc::new(PostgresBackoffice::postgres(pool));

    let customer = format!("Omar {}", OrderId::new());
    let mut handles = Vec::new();
    for _ in 0..4 {
        let order_id = OrderId::new();
        returns
            .record_sale(&[OrderLine::sold(order_id, seeded.product, 1, Money::from_minor(10), Money::from_minor(10))])
            .await
            .unwrap();
        let backoffice = Arc::clone(&backoffice);
        let request = ReturnRequest {
            order_id,
            employee_id: EmployeeId::new(),
            customer_name: customer.clone(),
            lines: vec![ReturnLineRequest {
                product_id: seeded.product,
                quantity: 1,
                note: None,
            }],
        };
        handles.push(tokio::spawn(async move { backoffice.process_return(request).await }));
    }

    let mut accepted = 0u64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(err.is_retryable(), "unexpected error: {err:?}"),
        }
    }

    let active: Vec<_> = backoffice
        .active_credits()
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.customer_name == customer)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].credit_amount, Money::from_minor(10 * accepted));
}
