//! # Record Repository
//!
//! Durable CRUD access to the typed record collections, plus the
//! write-and-queue entry points that pair every remote-bound local write
//! with an outbound mutation in a single transaction.
//!
//! ## Write-and-Queue
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  save_and_queue / delete_and_queue                      │
//! │                                                                         │
//! │  LOCAL OPERATION (e.g., cashier edits a product)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO products (id, business_id, payload, ...)       │   │
//! │  │     ON CONFLICT(id) DO UPDATE ...                              │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO offline_queue (id, collection, record_id,      │   │
//! │  │     op, payload, ...)                                          │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • A remote-bound write can never lose its queue entry                 │
//! │  • Pulled remote data uses put_many, which never enqueues              │
//! │  • Local reads always see the latest local write                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read Recovery
//! All read paths (`get_all`, `get_by_id`, `get_by_business`,
//! `transactions_in_range`) treat storage errors as "nothing cached yet":
//! they log and return empty results instead of propagating. Write paths
//! propagate loudly so the caller can tell the user the action was not
//! saved.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use tally_core::{Collection, MutationOp, OutboundMutation, Record, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::outbox;

/// Formats a timestamp for storage. Fixed-width UTC RFC3339 so that the
/// stored text sorts chronologically.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp back.
pub(crate) fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}

// =============================================================================
// Record Repository
// =============================================================================

/// Repository for collection CRUD and write-and-queue operations.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

impl RecordRepository {
    /// Creates a new RecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecordRepository { pool }
    }

    // =========================================================================
    // Reads (error-recovering)
    // =========================================================================

    /// Returns all records in the collection. Order is unspecified.
    ///
    /// On any failure returns an empty Vec - callers treat storage errors
    /// as "nothing cached yet", never as fatal.
    pub async fn get_all<R: Record>(&self) -> Vec<R> {
        match self.fetch_all::<R>().await {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %R::COLLECTION, error = %e, "Read failed, returning empty");
                Vec::new()
            }
        }
    }

    /// Returns the record with the given id, or `None` if absent (or if
    /// the read failed - same recovery policy as `get_all`).
    pub async fn get_by_id<R: Record>(&self, id: &str) -> Option<R> {
        match self.fetch_by_id::<R>(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(collection = %R::COLLECTION, id = %id, error = %e, "Read failed");
                None
            }
        }
    }

    /// Returns all records owned by the given business. Indexed lookup.
    pub async fn get_by_business<R: Record>(&self, business_id: &str) -> Vec<R> {
        let sql = format!(
            "SELECT payload FROM {} WHERE business_id = ?1",
            R::COLLECTION.table()
        );

        let result: StoreResult<Vec<R>> = async {
            let payloads: Vec<String> = sqlx::query_scalar(&sql)
                .bind(business_id)
                .fetch_all(&self.pool)
                .await?;
            decode_payloads(payloads)
        }
        .await;

        match result {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %R::COLLECTION, business_id = %business_id, error = %e, "Read failed, returning empty");
                Vec::new()
            }
        }
    }

    /// Returns transactions with `from <= date < to`, oldest first.
    /// Uses the date index (schema version 2).
    pub async fn transactions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Transaction> {
        let result: StoreResult<Vec<Transaction>> = async {
            let payloads: Vec<String> = sqlx::query_scalar(
                "SELECT payload FROM transactions WHERE date >= ?1 AND date < ?2 ORDER BY date ASC",
            )
            .bind(format_ts(from))
            .bind(format_ts(to))
            .fetch_all(&self.pool)
            .await?;
            decode_payloads(payloads)
        }
        .await;

        match result {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Transaction range read failed, returning empty");
                Vec::new()
            }
        }
    }

    async fn fetch_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let sql = format!("SELECT payload FROM {}", R::COLLECTION.table());
        let payloads: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        decode_payloads(payloads)
    }

    async fn fetch_by_id<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let sql = format!(
            "SELECT payload FROM {} WHERE id = ?1",
            R::COLLECTION.table()
        );
        let payload: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match payload {
            Some(raw) => {
                let record = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {e}", R::COLLECTION)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // Writes (error-propagating)
    // =========================================================================

    /// Upserts a batch atomically - either all records are written or none
    /// are (single transaction). Does NOT enqueue outbound mutations: this
    /// is the path for data pulled from the remote system, which must never
    /// echo back.
    pub async fn put_many<R: Record>(&self, records: &[R]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for record in records {
            upsert_on(&mut tx, record).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(collection = %R::COLLECTION, count = records.len(), "Batch upsert committed");
        Ok(())
    }

    /// Deletes one record by id. Idempotent: deleting an absent id is not
    /// an error. Does NOT enqueue.
    pub async fn delete_by_id<R: Record>(&self, id: &str) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", R::COLLECTION.table());
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Empties one collection. Used only for explicit resets, never
    /// implicitly.
    pub async fn clear(&self, collection: Collection) -> StoreResult<()> {
        let sql = format!("DELETE FROM {}", collection.table());
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        debug!(collection = %collection, removed = result.rows_affected(), "Collection cleared");
        Ok(())
    }

    /// Counts records in a collection.
    pub async fn count(&self, collection: Collection) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    // =========================================================================
    // Write-and-Queue (error-propagating)
    // =========================================================================

    /// Upserts a record AND appends the matching outbound mutation in one
    /// transaction, so enqueue-on-write is structurally guaranteed rather
    /// than a convention callers can forget.
    ///
    /// Returns the persisted mutation with its assigned queue sequence.
    pub async fn save_and_queue<R: Record>(
        &self,
        record: &R,
        op: MutationOp,
    ) -> StoreResult<OutboundMutation> {
        let mut mutation = OutboundMutation::for_record(op, record)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        upsert_on(&mut tx, record).await?;
        mutation.seq = outbox::insert_on(&mut tx, &mutation).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(
            collection = %R::COLLECTION,
            record_id = %record.id(),
            op = %op,
            seq = mutation.seq,
            "Record saved and queued"
        );
        Ok(mutation)
    }

    /// Deletes a record AND appends the matching delete mutation in one
    /// transaction. The delete is queued even if the record was already
    /// locally absent - the remote copy may still exist.
    pub async fn delete_and_queue<R: Record>(&self, id: &str) -> StoreResult<OutboundMutation> {
        let mut mutation = OutboundMutation::for_delete(R::COLLECTION, id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let sql = format!("DELETE FROM {} WHERE id = ?1", R::COLLECTION.table());
        sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        mutation.seq = outbox::insert_on(&mut tx, &mutation).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(
            collection = %R::COLLECTION,
            record_id = %id,
            seq = mutation.seq,
            "Record deleted and delete queued"
        );
        Ok(mutation)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn decode_payloads<R: Record>(payloads: Vec<String>) -> StoreResult<Vec<R>> {
    payloads
        .iter()
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", R::COLLECTION)))
        })
        .collect()
}

/// Upserts one record on an open transaction/connection. Last write wins
/// locally: inserting an existing id overwrites the whole row.
async fn upsert_on<R: Record>(conn: &mut SqliteConnection, record: &R) -> StoreResult<()> {
    let payload = serde_json::to_string(record)?;
    let updated_at = format_ts(Utc::now());

    if R::COLLECTION.has_date_index() {
        let date = record
            .indexed_date()
            .map(format_ts)
            .ok_or_else(|| StoreError::Internal(format!("{} record missing date", R::COLLECTION)))?;

        let sql = format!(
            "INSERT INTO {} (id, business_id, date, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 business_id = excluded.business_id,
                 date = excluded.date,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
            R::COLLECTION.table()
        );

        sqlx::query(&sql)
            .bind(record.id())
            .bind(record.business_id())
            .bind(date)
            .bind(payload)
            .bind(updated_at)
            .execute(&mut *conn)
            .await?;
    } else {
        let sql = format!(
            "INSERT INTO {} (id, business_id, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 business_id = excluded.business_id,
                 payload = excluded.payload,
                 updated_at = excluded.updated_at",
            R::COLLECTION.table()
        );

        sqlx::query(&sql)
            .bind(record.id())
            .bind(record.business_id())
            .bind(payload)
            .bind(updated_at)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
