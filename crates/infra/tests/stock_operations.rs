mod common;

use std::sync::Arc;

use proptest::prelude::*;

use backoffice_core::{BatchId, BranchId, ProductId, SupplierId};
use backoffice_infra::{MarkDamagedRequest, ServiceError};
use backoffice_inventory::MovementAction;

use common::Fixture;

#[tokio::test(flavor = "multi_thread")]
async fn supply_batch_creates_records_and_one_stock_in_per_line() {
    let fx = Fixture::new();
    let second = fx.new_product();
    let batch = fx.supply_batch(fx.downtown, &[(fx.product, 12), (second, 4)]);
    let batch_id = batch.batch_id;

    let returned = fx.backoffice.receive_supply(batch).await.unwrap();
    assert_eq!(returned, batch_id);

    let first = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();
    assert_eq!((first.quantity, first.damaged), (12, 0));
    let other = fx.backoffice.get_stock(second, fx.downtown).await.unwrap();
    assert_eq!(other.quantity, 4);

    let movements = fx.backoffice.batch_movements(batch_id).await.unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| m.action == MovementAction::StockIn
        && m.source_branch_id.is_none()
        && m.destination_branch_id == Some(fx.downtown)));
    assert!(movements[0].sequence < movements[1].sequence);
}

#[tokio::test(flavor = "multi_thread")]
async fn supply_batch_with_one_invalid_line_writes_nothing() {
    let fx = Fixture::new();
    let (second, third) = (fx.new_product(), fx.new_product());
    fx.seed(fx.product, fx.downtown, 7).await;

    let batch = fx.supply_batch(fx.downtown, &[(fx.product, 3), (second, 2), (third, 0)]);
    let batch_id = batch.batch_id;
    let err = fx.backoffice.receive_supply(batch).await.unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap().quantity, 7);
    assert!(fx.backoffice.stock_levels(second).await.unwrap().is_empty());
    assert!(fx.backoffice.stock_levels(third).await.unwrap().is_empty());
    assert!(fx.backoffice.batch_movements(batch_id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn supply_from_unknown_supplier_or_of_archived_product_is_rejected() {
    let fx = Fixture::new();

    let mut batch = fx.supply_batch(fx.downtown, &[(fx.product, 3)]);
    batch.supplier_id = SupplierId::new();
    let err = fx.backoffice.receive_supply(batch).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("unknown supplier")));

    let archived = ProductId::new();
    fx.register_product(archived, true);
    let err = fx
        .backoffice
        .receive_supply(fx.supply_batch(fx.downtown, &[(archived, 3)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("archived")));

    let unknown_branch = BranchId::new();
    let err = fx
        .backoffice
        .receive_supply(fx.supply_batch(unknown_branch, &[(fx.product, 3)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn stock_out_beyond_on_hand_is_rejected_and_leaves_record_unchanged() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 2).await;
    let before = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();

    let err = fx
        .backoffice
        .stock_out(fx.stock_out(fx.downtown, 5, "Sold"))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert!(!err.is_retryable());
    let after = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();
    assert_eq!(after, before);
    assert_eq!((after.quantity, after.damaged), (2, 0));
    assert_eq!(
        fx.backoffice.movement_history(fx.product, fx.downtown).await.unwrap().len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_stock_outs_never_oversell() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 5).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let backoffice = Arc::clone(&fx.backoffice);
        let request = fx.stock_out(fx.downtown, 1, "Sold");
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

    assert_eq!(ok, 5);
    assert_eq!(insufficient, 5);
    let record = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();
    assert_eq!(record.quantity, 0);
    let outs = fx
        .backoffice
        .movement_history(fx.product, fx.downtown)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.action == MovementAction::StockOut)
        .count();
    assert_eq!(outs, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn stock_out_lines_share_a_caller_batch() {
    let fx = Fixture::new();
    let second = fx.new_product();
    fx.seed(fx.product, fx.downtown, 4).await;
    fx.seed(second, fx.downtown, 4).await;

    let batch_id = BatchId::new();
    let mut first_line = fx.stock_out(fx.downtown, 1, "Sold");
    first_line.batch_id = Some(batch_id);
    let mut second_line = fx.stock_out(fx.downtown, 2, "Lost");
    second_line.product_id = second;
    second_line.batch_id = Some(batch_id);
    second_line.note = Some("shelf count".to_string());

    fx.backoffice.stock_out(first_line).await.unwrap();
    fx.backoffice.stock_out(second_line).await.unwrap();

    let movements = fx.backoffice.batch_movements(batch_id).await.unwrap();
    assert_eq!(movements.len(), 2);
    assert_eq!(movements[0].reason.as_deref(), Some("Sold"));
    assert_eq!(movements[1].reason.as_deref(), Some("Lost"));
    assert_eq!(movements[1].note.as_deref(), Some("shelf count"));
    assert_eq!(movements[1].employee_id, Some(fx.employee));
}

#[tokio::test(flavor = "multi_thread")]
async fn generated_batch_ids_are_distinct() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 4).await;

    let a = fx.backoffice.stock_out(fx.stock_out(fx.downtown, 1, "Sold")).await.unwrap();
    let b = fx.backoffice.stock_out(fx.stock_out(fx.downtown, 1, "Sold")).await.unwrap();
    assert_ne!(a.batch_id, b.batch_id);
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_reason_and_non_positive_quantity_are_validation_errors() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 4).await;

    let err = fx.backoffice.stock_out(fx.stock_out(fx.downtown, 1, "  ")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = fx.backoffice.stock_out(fx.stock_out(fx.downtown, 0, "Sold")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn transfer_moves_units_and_conserves_the_total() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 10).await;

    let receipt = fx
        .backoffice
        .transfer_stock(fx.transfer(fx.downtown, fx.airport, 4))
        .await
        .unwrap();

    assert_eq!(receipt.records.len(), 2);
    assert_eq!(receipt.movements.len(), 1);
    let movement = &receipt.movements[0];
    assert_eq!(movement.action, MovementAction::Transfer);
    assert_eq!(movement.source_branch_id, Some(fx.downtown));
    assert_eq!(movement.destination_branch_id, Some(fx.airport));

    assert_eq!(fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap().quantity, 6);
    assert_eq!(fx.backoffice.get_stock(fx.product, fx.airport).await.unwrap().quantity, 4);
    let total: i64 = fx
        .backoffice
        .stock_levels(fx.product)
        .await
        .unwrap()
        .iter()
        .map(|r| r.quantity)
        .sum();
    assert_eq!(total, 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_transfer_mutates_neither_side() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 3).await;

    let err = fx
        .backoffice
        .transfer_stock(fx.transfer(fx.downtown, fx.airport, 4))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert_eq!(fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap().quantity, 3);
    let destination = fx.backoffice.get_stock(fx.product, fx.airport).await.unwrap();
    assert_eq!((destination.quantity, destination.version), (0, 0));
    assert!(fx.backoffice.branch_stock(fx.airport).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn transfer_to_the_same_branch_is_rejected() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 3).await;
    let err = fx
        .backoffice
        .transfer_stock(fx.transfer(fx.downtown, fx.downtown, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn opposing_concurrent_transfers_conserve_stock() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 20).await;
    fx.seed(fx.product, fx.airport, 20).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let backoffice = Arc::clone(&fx.backoffice);
        let request = if i % 2 == 0 {
            fx.transfer(fx.downtown, fx.airport, 3)
        } else {
            fx.transfer(fx.airport, fx.downtown, 2)
        };
        handles.push(tokio::spawn(async move { backoffice.transfer_stock(request).await }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let records = fx.backoffice.stock_levels(fx.product).await.unwrap();
    assert_eq!(records.iter().map(|r| r.quantity).sum::<i64>(), 40);
    assert!(records.iter().all(|r| r.quantity >= 0));
}

fn mark_damaged(fx: &Fixture, quantity: i64) -> MarkDamagedRequest {
    MarkDamagedRequest {
        product_id: fx.product,
        branch_id: fx.downtown,
        quantity,
        batch_id: None,
        employee_id: Some(fx.employee),
        note: Some("water damage".to_string()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn damaged_units_are_flagged_then_written_off() {
    let fx = Fixture::new();
    fx.seed(fx.product, fx.downtown, 5).await;

    fx.backoffice.mark_damaged(mark_damaged(&fx, 3)).await.unwrap();
    let flagged = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();
    assert_eq!((flagged.quantity, flagged.damaged), (5, 3));
    assert_eq!(flagged.sellable(), 2);

    // Only 2 units are not already damaged.
    let err = fx.backoffice.mark_damaged(mark_damaged(&fx, 3)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    fx.backoffice
        .stock_out(fx.stock_out(fx.downtown, 2, "Damaged"))
        .await
        .unwrap();
    let written_off = fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap();
    assert_eq!((written_off.quantity, written_off.damaged), (3, 1));

    // A sale cannot consume the remaining damaged unit.
    let err = fx
        .backoffice
        .stock_out(fx.stock_out(fx.downtown, 3, "Sold"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let err = fx
        .backoffice
        .stock_out(fx.stock_out(fx.downtown, 2, "Damaged"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert_eq!(
        fx.backoffice.get_stock(fx.product, fx.downtown).await.unwrap(),
        written_off
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn operations_against_unknown_references_are_rejected() {
    let fx = Fixture::new();
    let mut request = fx.stock_out(fx.downtown, 1, "Sold");
    request.product_id = ProductId::new();
    let err = fx.backoffice.stock_out(request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("unknown product")));

    let err = fx
        .backoffice
        .transfer_stock(fx.transfer(fx.downtown, BranchId::new(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(msg) if msg.contains("unknown branch")));
}

#[tokio::test(flavor = "multi_thread")]
async fn absent_pair_reads_as_zero_record() {
    let fx = Fixture::new();
    let record = fx.backoffice.get_stock(fx.product, fx.airport).await.unwrap();
    assert_eq!((record.quantity, record.damaged, record.version), (0, 0, 0));
    assert_eq!(record.product_id, fx.product);
    assert_eq!(record.branch_id, fx.airport);
}

#[derive(Debug, Clone)]
enum Op {
    Receive(usize, i64),
    Sell(usize, i64),
    WriteOff(usize, i64),
    Damage(usize, i64),
    Move(usize, usize, i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..2, 1i64..10).prop_map(|(b, q)| Op::Receive(b, q)),
        (0usize..2, 1i64..10).prop_map(|(b, q)| Op::Sell(b, q)),
        (0usize..2, 1i64..10).prop_map(|(b, q)| Op::WriteOff(b, q)),
        (0usize..2, 1i64..10).prop_map(|(b, q)| Op::Damage(b, q)),
        (0usize..2, 0usize..2, 1i64..10).prop_map(|(a, b, q)| Op::Move(a, b, q)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: whatever mix of operations is accepted or rejected, every
    /// record keeps `0 <= damaged <= quantity` and the log explains the ledger.
    #[test]
    fn ledger_invariants_hold_for_any_operation_sequence(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let fx = Fixture::new();
            let branches = [fx.downtown, fx.airport];

            for op in ops {
                let _ = match op {
                    Op::Receive(b, q) => fx
                        .backoffice
                        .receive_supply(fx.supply_batch(branches[b], &[(fx.product, q)]))
                        .await
                        .map(|_| ()),
                    Op::Sell(b, q) => fx.backoffice.stock_out(fx.stock_out(branches[b], q, "Sold")).await.map(|_| ()),
                    Op::WriteOff(b, q) => fx.backoffice.stock_out(fx.stock_out(branches[b], q, "Damaged")).await.map(|_| ()),
                    Op::Damage(b, q) => {
                        let mut request = mark_damaged(&fx, q);
                        request.branch_id = branches[b];
                        fx.backoffice.mark_damaged(request).await.map(|_| ())
                    }
                    Op::Move(a, b, q) => fx.backoffice.transfer_stock(fx.transfer(branches[a], branches[b], q)).await.map(|_| ()),
                };

                for record in fx.backoffice.stock_levels(fx.product).await.unwrap() {
                    prop_assert!(record.damaged >= 0);
                    prop_assert!(record.damaged <= record.quantity);
                }
            }

            for branch in branches {
                let record = fx.backoffice.get_stock(fx.product, branch).await.unwrap();
                let mut replayed = 0i64;
                for m in fx.backoffice.movement_history(fx.product, branch).await.unwrap() {
                    match m.action {
                        MovementAction::StockIn => replayed += m.quantity,
                        MovementAction::StockOut => replayed -= m.quantity,
                        MovementAction::Transfer if m.source_branch_id == Some(branch) => replayed -= m.quantity,
                        MovementAction::Transfer => replayed += m.quantity,
                        MovementAction::MarkDamaged => {}
                    }
                }
                prop_assert_eq!(replayed, record.quantity);
            }
            Ok(())
        })?;
    }
}
