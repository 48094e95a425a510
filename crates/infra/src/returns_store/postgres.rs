//! Postgres-backed returns store.
//!
//! `settle_return` locks the order's lines (`FOR UPDATE`, product order) and
//! the customer's active credit, decides with [`settle`], then writes lines,
//! credit and notes before committing. The partial unique index
//! `store_credits_one_active` keeps one active credit per customer: two
//! returns racing to open a first credit for the same customer surface the
//! loser as a retryable [`StoreError::Conflict`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use backoffice_core::{CreditId, DomainError, Money, OrderId, ProductId};
use backoffice_sales::{settle, OrderLine, ReturnNote, ReturnRequest, ReturnSettlement, StoreCredit};

use super::ReturnsStore;
use crate::error::{corrupt, map_sqlx_error, SettlementError, StoreError, WriteError};

#[derive(Debug, Clone)]
pub struct PostgresReturnsStore {
    pool: PgPool,
}

impl PostgresReturnsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register sold lines, as written by the POS.
    pub async fn record_sale(&self, lines: &[OrderLine]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_id, product_id, quantity, unit_price, unit_price_deducted,
                    returned_quantity, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.order_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(money_to_db(line.unit_price)?)
            .bind(money_to_db(line.unit_price_deducted)?)
            .bind(line.returned_quantity)
            .bind(line.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn money_to_db(amount: Money) -> Result<i64, StoreError> {
    amount
        .to_i64()
        .map_err(|e| StoreError::Constraint(e.to_string()))
}

fn money_from_db(value: i64, op: &str) -> Result<Money, StoreError> {
    Money::from_i64(value).map_err(|e| corrupt(op, e))
}

const LINE_COLUMNS: &str =
    "order_id, product_id, quantity, unit_price, unit_price_deducted, returned_quantity, status";
const CREDIT_COLUMNS: &str = "id, customer_name, credit_amount, status, created_at, updated_at";

struct OrderLineRow {
    order_id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i64,
    unit_price: i64,
    unit_price_deducted: i64,
    returned_quantity: i64,
    status: String,
}

impl<'r> FromRow<'r, PgRow> for OrderLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderLineRow {
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            unit_price_deducted: row.try_get("unit_price_deducted")?,
            returned_quantity: row.try_get("returned_quantity")?,
            status: row.try_get("status")?,
        })
    }
}

fn decode_line(row: &PgRow) -> Result<OrderLine, StoreError> {
    const OP: &str = "decode_order_line";
    let row = OrderLineRow::from_row(row).map_err(|e| map_sqlx_error(OP, e))?;
    Ok(OrderLine {
        order_id: row.order_id.into(),
        product_id: row.product_id.into(),
        quantity: row.quantity,
        unit_price: money_from_db(row.unit_price, OP)?,
        unit_price_deducted: money_from_db(row.unit_price_deducted, OP)?,
        returned_quantity: row.returned_quantity,
        status: row.status.parse().map_err(|e| corrupt(OP, e))?,
    })
}

struct CreditRow {
    id: uuid::Uuid,
    customer_name: String,
    credit_amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for CreditRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CreditRow {
            id: row.try_get("id")?,
            customer_name: row.try_get("customer_name")?,
            credit_amount: row.try_get("credit_amount")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn decode_credit(row: &PgRow) -> Result<StoreCredit, StoreError> {
    const OP: &str = "decode_store_credit";
    let row = CreditRow::from_row(row).map_err(|e| map_sqlx_error(OP, e))?;
    Ok(StoreCredit {
        id: row.id.into(),
        customer_name: row.customer_name,
        credit_amount: money_from_db(row.credit_amount, OP)?,
        status: row.status.parse().map_err(|e| corrupt(OP, e))?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn decode_note(row: &PgRow) -> Result<ReturnNote, StoreError> {
    const OP: &str = "decode_return_note";
    let get = |e: sqlx::Error| map_sqlx_error(OP, e);
    let order_id: uuid::Uuid = row.try_get("order_id").map_err(get)?;
    let product_id: uuid::Uuid = row.try_get("product_id").map_err(get)?;
    let employee_id: uuid::Uuid = row.try_get("employee_id").map_err(get)?;
    let refund: i64 = row.try_get("refund").map_err(get)?;
    Ok(ReturnNote {
        order_id: order_id.into(),
        product_id: product_id.into(),
        employee_id: employee_id.into(),
        quantity: row.try_get("quantity").map_err(get)?,
        refund: money_from_db(refund, OP)?,
        note: row.try_get("note").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

async fn lock_credit(
    tx: &mut Transaction<'static, Postgres>,
    id: CreditId,
) -> Result<StoreCredit, SettlementError> {
    let row = sqlx::query(&format!(
        "SELECT {CREDIT_COLUMNS} FROM store_credits WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_store_credit", e))?;

    match row {
        Some(row) => Ok(decode_credit(&row)?),
        None => Err(WriteError::Rejected(DomainError::not_found(format!("store credit {id}")))),
    }
}

async fn write_credit(
    tx: &mut Transaction<'static, Postgres>,
    credit: &StoreCredit,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE store_credits
        SET credit_amount = $2, status = $3, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(credit.id.as_uuid())
    .bind(money_to_db(credit.credit_amount)?)
    .bind(credit.status.as_str())
    .bind(credit.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_store_credit", e))?;
    Ok(())
}

impl PostgresReturnsStore {
    async fn change_credit(
        &self,
        id: CreditId,
        change: impl FnOnce(&StoreCredit) -> Result<StoreCredit, DomainError> + Send,
    ) -> Result<StoreCredit, SettlementError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = lock_credit(&mut tx, id).await?;
        let next = match change(&current) {
            Ok(next) => next,
            Err(rejection) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(WriteError::Rejected(rejection));
            }
        };
        write_credit(&mut tx, &next).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(next)
    }
}

#[async_trait::async_trait]
impl ReturnsStore for PostgresReturnsStore {
    async fn order_line(
        &self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderLine>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = $1 AND product_id = $2"
        ))
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_line", e))?;

        row.as_ref().map(decode_line).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = $1 ORDER BY product_id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("order_lines", e))?;

        rows.iter().map(decode_line).collect()
    }

    #[instrument(
        skip(self, request),
        fields(order_id = %request.order_id, line_count = request.lines.len()),
        err
    )]
    async fn settle_return(
        &self,
        request: &ReturnRequest,
        at: DateTime<Utc>,
    ) -> Result<ReturnSettlement, SettlementError> {
        let product_ids: Vec<uuid::Uuid> = request
            .product_ids()
            .into_iter()
            .map(uuid::Uuid::from)
            .collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines \
             WHERE order_id = $1 AND product_id = ANY($2) \
             ORDER BY product_id ASC \
             FOR UPDATE"
        ))
        .bind(request.order_id.as_uuid())
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_order_lines", e))?;

        let mut sold = BTreeMap::new();
        for row in &rows {
            let line = decode_line(row)?;
            sold.insert(line.product_id, line);
        }

        let active = sqlx::query(&format!(
            "SELECT {CREDIT_COLUMNS} FROM store_credits \
             WHERE customer_name = $1 AND status = 'active' \
             FOR UPDATE"
        ))
        .bind(request.customer())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_active_credit", e))?
        .as_ref()
        .map(decode_credit)
        .transpose()?;

        let settlement = match settle(request, &sold, active.as_ref(), at) {
            Ok(settlement) => settlement,
            Err(rejection) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(WriteError::Rejected(rejection));
            }
        };

        for line in &settlement.lines {
            sqlx::query(
                r#"
                UPDATE order_lines
                SET returned_quantity = $3, status = $4
                WHERE order_id = $1 AND product_id = $2
                "#,
            )
            .bind(line.order_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(line.returned_quantity)
            .bind(line.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_order_line", e))?;
        }

        let credit = &settlement.credit;
        if settlement.credit_opened {
            sqlx::query(
                r#"
                INSERT INTO store_credits (id, customer_name, credit_amount, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(credit.id.as_uuid())
            .bind(&credit.customer_name)
            .bind(money_to_db(credit.credit_amount)?)
            .bind(credit.status.as_str())
            .bind(credit.created_at)
            .bind(credit.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_store_credit", e))?;
        } else {
            write_credit(&mut tx, credit).await?;
        }

        for note in &settlement.notes {
            sqlx::query(
                r#"
                INSERT INTO return_notes (order_id, product_id, employee_id, quantity, refund, note, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(note.order_id.as_uuid())
            .bind(note.product_id.as_uuid())
            .bind(note.employee_id.as_uuid())
            .bind(note.quantity)
            .bind(money_to_db(note.refund)?)
            .bind(note.note.as_deref())
            .bind(note.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_return_note", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(settlement)
    }

    async fn credit(&self, id: CreditId) -> Result<Option<StoreCredit>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CREDIT_COLUMNS} FROM store_credits WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("store_credit", e))?;

        row.as_ref().map(decode_credit).transpose()
    }

    async fn active_credits(&self) -> Result<Vec<StoreCredit>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CREDIT_COLUMNS} FROM store_credits WHERE status = 'active' ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_credits", e))?;

        rows.iter().map(decode_credit).collect()
    }

    #[instrument(skip(self), fields(credit_id = %id), err)]
    async fn redeem_credit(
        &self,
        id: CreditId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<StoreCredit, SettlementError> {
        self.change_credit(id, |credit| credit.redeem(amount, at)).await
    }

    #[instrument(skip(self), fields(credit_id = %id), err)]
    async fn void_credit(&self, id: CreditId, at: DateTime<Utc>) -> Result<StoreCredit, SettlementError> {
        self.change_credit(id, |credit| credit.void(at)).await
    }

    async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, employee_id, quantity, refund, note, created_at
            FROM return_notes
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("return_notes", e))?;

        rows.iter().map(decode_note).collect()
    }
}
