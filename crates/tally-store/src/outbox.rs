//! # Outbound Mutation Queue
//!
//! Durable FIFO queue of changes awaiting remote confirmation.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    offline_queue Table                                  │
//! │                                                                         │
//! │  seq │ record_id │ op     │ attempts │ flagged │                       │
//! │  ────┼───────────┼────────┼──────────┼─────────┤                       │
//! │  1   │ P1        │ create │ 0        │ 0       │ ← next to drain       │
//! │  2   │ P1        │ update │ 2        │ 0       │                       │
//! │  3   │ S9        │ delete │ 5        │ 1       │ ← fatally rejected,   │
//! │      │           │        │          │         │   kept for inspection │
//! │                                                                         │
//! │  ENTRY LIFECYCLE:                                                      │
//! │  ────────────────                                                      │
//! │  enqueued (same transaction as the record write)                       │
//! │       │                                                                 │
//! │       ├── remote confirms        → delete(id)       [gone]             │
//! │       ├── retryable failure      → mark_failed(..., fatal=false)       │
//! │       │                            [attempts += 1, stays queued]       │
//! │       └── fatal rejection        → mark_failed(..., fatal=true)        │
//! │                                    [flagged, excluded from pending]    │
//! │                                                                         │
//! │  Deletion only ever happens after confirmed remote success, so an      │
//! │  interrupted sync cycle simply resumes with the same queue.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use tally_core::{MutationOp, OutboundMutation};

use crate::error::{StoreError, StoreResult};
use crate::records::{format_ts, parse_ts};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw row shape; decoded into [`OutboundMutation`] with parsed enums.
#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    id: String,
    collection: String,
    record_id: String,
    op: String,
    payload: Option<String>,
    attempts: i64,
    last_error: Option<String>,
    flagged: bool,
    created_at: String,
}

impl TryFrom<OutboxRow> for OutboundMutation {
    type Error = StoreError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let collection = row
            .collection
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("unknown collection '{}'", row.collection)))?;
        let op: MutationOp = row
            .op
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("unknown op '{}'", row.op)))?;

        Ok(OutboundMutation {
            seq: row.seq,
            id: row.id,
            collection,
            record_id: row.record_id,
            op,
            payload: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
            flagged: row.flagged,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

/// Inserts a mutation on an open transaction/connection and returns the
/// assigned queue sequence. Shared with the record repository so the
/// record write and the queue append commit together.
pub(crate) async fn insert_on(
    conn: &mut SqliteConnection,
    mutation: &OutboundMutation,
) -> StoreResult<i64> {
    let result = sqlx::query(
        "INSERT INTO offline_queue (
            id, collection, record_id, op, payload,
            attempts, last_error, flagged, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&mutation.id)
    .bind(mutation.collection.table())
    .bind(&mutation.record_id)
    .bind(mutation.op.to_string())
    .bind(&mutation.payload)
    .bind(mutation.attempts)
    .bind(&mutation.last_error)
    .bind(mutation.flagged)
    .bind(format_ts(mutation.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

// =============================================================================
// Outbox Repository
// =============================================================================

/// Repository for outbound mutation queue operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Enqueues a standalone mutation.
    ///
    /// Prefer `RecordRepository::save_and_queue` / `delete_and_queue`,
    /// which pair the queue append with the record write in one
    /// transaction. This direct path exists for replay tooling and tests.
    pub async fn enqueue(&self, mutation: &OutboundMutation) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let seq = insert_on(&mut conn, mutation).await?;

        debug!(
            id = %mutation.id,
            collection = %mutation.collection,
            record_id = %mutation.record_id,
            op = %mutation.op,
            seq,
            "Mutation enqueued"
        );
        Ok(seq)
    }

    /// Returns pending (unflagged) mutations in FIFO order, oldest first.
    pub async fn pending(&self, limit: u32) -> StoreResult<Vec<OutboundMutation>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT seq, id, collection, record_id, op, payload,
                    attempts, last_error, flagged, created_at
             FROM offline_queue
             WHERE flagged = 0
             ORDER BY seq ASC
             LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboundMutation::try_from).collect()
    }

    /// Returns flagged mutations (fatally rejected, awaiting inspection).
    /// The diagnostics surface required by the error-handling design.
    pub async fn flagged(&self) -> StoreResult<Vec<OutboundMutation>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT seq, id, collection, record_id, op, payload,
                    attempts, last_error, flagged, created_at
             FROM offline_queue
             WHERE flagged = 1
             ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboundMutation::try_from).collect()
    }

    /// Deletes a mutation. Called only after the remote system confirmed
    /// it - never on failure paths.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM offline_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a delivery failure. `fatal` flags the entry out of the
    /// normal drain so it cannot retry forever; it stays queryable via
    /// [`flagged`](Self::flagged).
    pub async fn mark_failed(&self, id: &str, error: &str, fatal: bool) -> StoreResult<()> {
        sqlx::query(
            "UPDATE offline_queue SET
                attempts = attempts + 1,
                last_error = ?2,
                flagged = flagged OR ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(fatal)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Clears the flag on a mutation so the next cycle retries it.
    /// Operator action after inspecting a fatal rejection.
    pub async fn requeue(&self, id: &str) -> StoreResult<()> {
        sqlx::query("UPDATE offline_queue SET flagged = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Counts pending (unflagged) mutations.
    pub async fn count_pending(&self) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM offline_queue WHERE flagged = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
