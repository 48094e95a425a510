//! Postgres-backed stock ledger.
//!
//! A posting runs in one transaction:
//! 1. make sure a row exists for every touched key (`INSERT .. ON CONFLICT DO NOTHING`)
//! 2. lock those rows with `SELECT .. FOR UPDATE`, always in key order so two
//!    postings over overlapping keys cannot deadlock
//! 3. apply the deltas in memory ([`Posting::apply_to`]) and reject on violation
//! 4. write the new rows guarded by their version, append the movements, commit
//!
//! The table's `CHECK (damaged >= 0 AND damaged <= quantity)` backs up step 3.

use std::collections::BTreeMap;

use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use backoffice_core::{BatchId, BranchId, ProductId};
use backoffice_inventory::{MovementEntry, Posting, StockKey, StockRecord};

use super::{PostingReceipt, StockLedger};
use crate::error::{corrupt, map_sqlx_error, PostingError, StoreError, WriteError};

#[derive(Debug, Clone)]
pub struct PostgresStockLedger {
    pool: PgPool,
}

impl PostgresStockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct StockRow {
    product_id: uuid::Uuid,
    branch_id: uuid::Uuid,
    quantity: i64,
    damaged: i64,
    version: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for StockRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockRow {
            product_id: row.try_get("product_id")?,
            branch_id: row.try_get("branch_id")?,
            quantity: row.try_get("quantity")?,
            damaged: row.try_get("damaged")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<StockRow> for StockRecord {
    type Error = StoreError;

    fn try_from(row: StockRow) -> Result<Self, Self::Error> {
        let version = u64::try_from(row.version)
            .map_err(|_| StoreError::Corrupt(format!("negative stock version {}", row.version)))?;
        Ok(StockRecord {
            product_id: ProductId::from_uuid(row.product_id),
            branch_id: BranchId::from_uuid(row.branch_id),
            quantity: row.quantity,
            damaged: row.damaged,
            version,
        })
    }
}

struct MovementRow {
    id: uuid::Uuid,
    seq: i64,
    batch_id: uuid::Uuid,
    action: String,
    product_id: uuid::Uuid,
    source_branch_id: Option<uuid::Uuid>,
    destination_branch_id: Option<uuid::Uuid>,
    quantity: i64,
    employee_id: Option<uuid::Uuid>,
    reason: Option<String>,
    note: Option<String>,
    occurred_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            batch_id: row.try_get("batch_id")?,
            action: row.try_get("action")?,
            product_id: row.try_get("product_id")?,
            source_branch_id: row.try_get("source_branch_id")?,
            destination_branch_id: row.try_get("destination_branch_id")?,
            quantity: row.try_get("quantity")?,
            employee_id: row.try_get("employee_id")?,
            reason: row.try_get("reason")?,
            note: row.try_get("note")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<MovementRow> for MovementEntry {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(MovementEntry {
            id: row.id.into(),
            sequence: u64::try_from(row.seq)
                .map_err(|_| StoreError::Corrupt(format!("negative movement seq {}", row.seq)))?,
            batch_id: row.batch_id.into(),
            action: row.action.parse().map_err(|e| corrupt("decode movement action", e))?,
            product_id: row.product_id.into(),
            source_branch_id: row.source_branch_id.map(Into::into),
            destination_branch_id: row.destination_branch_id.map(Into::into),
            quantity: row.quantity,
            employee_id: row.employee_id.map(Into::into),
            reason: row.reason,
            note: row.note,
            occurred_at: row.occurred_at,
        })
    }
}

fn decode_record(row: &sqlx::postgres::PgRow, op: &str) -> Result<StockRecord, StoreError> {
    StockRow::from_row(row)
        .map_err(|e| map_sqlx_error(op, e))
        .and_then(StockRecord::try_from)
}

fn decode_records(rows: Vec<sqlx::postgres::PgRow>, op: &str) -> Result<Vec<StockRecord>, StoreError> {
    rows.iter().map(|row| decode_record(row, op)).collect()
}

fn decode_movements(rows: Vec<sqlx::postgres::PgRow>, op: &str) -> Result<Vec<MovementEntry>, StoreError> {
    rows.iter()
        .map(|row| {
            MovementRow::from_row(row)
                .map_err(|e| map_sqlx_error(op, e))
                .and_then(MovementEntry::try_from)
        })
        .collect()
}

const MOVEMENT_COLUMNS: &str = "id, seq, batch_id, action, product_id, source_branch_id, \
     destination_branch_id, quantity, employee_id, reason, note, occurred_at";

async fn lock_record(
    tx: &mut Transaction<'static, Postgres>,
    key: StockKey,
) -> Result<StockRecord, StoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_records (product_id, branch_id)
        VALUES ($1, $2)
        ON CONFLICT (product_id, branch_id) DO NOTHING
        "#,
    )
    .bind(key.product_id.as_uuid())
    .bind(key.branch_id.as_uuid())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_stock_record", e))?;

    let row = sqlx::query(
        r#"
        SELECT product_id, branch_id, quantity, damaged, version
        FROM stock_records
        WHERE product_id = $1 AND branch_id = $2
        FOR UPDATE
        "#,
    )
    .bind(key.product_id.as_uuid())
    .bind(key.branch_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_stock_record", e))?;

    decode_record(&row, "lock_stock_record")
}

fn encode_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version)
        .map_err(|_| StoreError::Corrupt(format!("stock version {version} exceeds storage range")))
}

async fn write_record(
    tx: &mut Transaction<'static, Postgres>,
    record: &StockRecord,
    expected_version: u64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE stock_records
        SET quantity = $3, damaged = $4, version = $5, updated_at = NOW()
        WHERE product_id = $1 AND branch_id = $2 AND version = $6
        "#,
    )
    .bind(record.product_id.as_uuid())
    .bind(record.branch_id.as_uuid())
    .bind(record.quantity)
    .bind(record.damaged)
    .bind(encode_version(record.version)?)
    .bind(encode_version(expected_version)?)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_stock_record", e))?;

    if result.rows_affected() != 1 {
        return Err(StoreError::Conflict(format!(
            "{} changed underneath version {expected_version}",
            record.key()
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl StockLedger for PostgresStockLedger {
    #[instrument(skip(self), fields(product_id = %key.product_id, branch_id = %key.branch_id), err)]
    async fn get(&self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, branch_id, quantity, damaged, version
            FROM stock_records
            WHERE product_id = $1 AND branch_id = $2
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.branch_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_stock_record", e))?;

        row.map(|r| decode_record(&r, "get_stock_record")).transpose()
    }

    async fn records_for_product(&self, product_id: ProductId) -> Result<Vec<StockRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, branch_id, quantity, damaged, version
            FROM stock_records
            WHERE product_id = $1
            ORDER BY branch_id ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("records_for_product", e))?;

        decode_records(rows, "records_for_product")
    }

    async fn records_for_branch(&self, branch_id: BranchId) -> Result<Vec<StockRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, branch_id, quantity, damaged, version
            FROM stock_records
            WHERE branch_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(branch_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("records_for_branch", e))?;

        decode_records(rows, "records_for_branch")
    }

    #[instrument(
        skip(self, posting),
        fields(
            batch_id = %posting.batch_id,
            delta_count = posting.deltas.len(),
            committed_movements = tracing::field::Empty
        ),
        err
    )]
    async fn post(&self, posting: Posting) -> Result<PostingReceipt, PostingError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // BTreeSet iteration gives the global lock order.
        let mut held = BTreeMap::new();
        for key in posting.keys() {
            held.insert(key, lock_record(&mut tx, key).await?);
        }
        let before = held.clone();

        let records = match posting.apply_to(&mut held) {
            Ok(records) => records,
            Err(violation) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(WriteError::Rejected(violation));
            }
        };

        for record in &records {
            let expected = before.get(&record.key()).map(|r| r.version).unwrap_or(0);
            write_record(&mut tx, record, expected).await?;
        }

        let mut movements = Vec::with_capacity(posting.movements.len());
        for pending in posting.movements {
            let row = sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id, batch_id, action, product_id, source_branch_id,
                    destination_branch_id, quantity, employee_id, reason, note, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING seq
                "#,
            )
            .bind(pending.id.as_uuid())
            .bind(pending.batch_id.as_uuid())
            .bind(pending.action.as_str())
            .bind(pending.product_id.as_uuid())
            .bind(pending.source_branch_id.map(uuid::Uuid::from))
            .bind(pending.destination_branch_id.map(uuid::Uuid::from))
            .bind(pending.quantity)
            .bind(pending.employee_id.map(uuid::Uuid::from))
            .bind(pending.reason.as_deref())
            .bind(pending.note.as_deref())
            .bind(pending.occurred_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;

            let seq: i64 = row
                .try_get("seq")
                .map_err(|e| map_sqlx_error("insert_movement", e))?;
            let sequence = u64::try_from(seq)
                .map_err(|_| StoreError::Corrupt(format!("negative movement seq {seq}")))?;
            movements.push(pending.commit(sequence));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_movements", movements.len());
        Ok(PostingReceipt {
            batch_id: posting.batch_id,
            records,
            movements,
        })
    }

    async fn batch_movements(&self, batch_id: BatchId) -> Result<Vec<MovementEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE batch_id = $1 ORDER BY seq ASC"
        ))
        .bind(batch_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("batch_movements", e))?;

        decode_movements(rows, "batch_movements")
    }

    async fn movement_history(&self, key: StockKey) -> Result<Vec<MovementEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = $1 AND (source_branch_id = $2 OR destination_branch_id = $2) \
             ORDER BY seq ASC"
        ))
        .bind(key.product_id.as_uuid())
        .bind(key.branch_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_history", e))?;

        decode_movements(rows, "movement_history")
    }
}
