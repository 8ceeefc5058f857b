//! # Outbound Mutations
//!
//! A queued, not-yet-confirmed change destined for the remote system of
//! record. Every local write that must reach the remote produces one of
//! these alongside the record write, in the same durable transaction.
//!
//! ## Queue Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     offline_queue Ordering                              │
//! │                                                                         │
//! │  seq │ record_id │ op      │                                           │
//! │  ────┼───────────┼─────────┤   Per record id, mutations replay in      │
//! │  1   │ P1        │ create  │   strict seq order: P1 create → update    │
//! │  2   │ P1        │ update  │   → delete, never reordered.              │
//! │  3   │ S9        │ update  │                                           │
//! │  4   │ P1        │ delete  │   Across record ids there is no ordering  │
//! │      │           │         │   obligation: S9 may land before P1.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An entry leaves the queue only after the remote confirms it (at-least-once
//! delivery). Fatally rejected entries are flagged and kept for inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::types::{Collection, Record};

// =============================================================================
// Mutation Operation
// =============================================================================

/// The remote operation an outbound mutation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationOp::Create => write!(f, "create"),
            MutationOp::Update => write!(f, "update"),
            MutationOp::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for MutationOp {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(MutationOp::Create),
            "update" => Ok(MutationOp::Update),
            "delete" => Ok(MutationOp::Delete),
            other => Err(crate::error::CoreError::UnknownOperation(other.to_string())),
        }
    }
}

// =============================================================================
// Outbound Mutation
// =============================================================================

/// An entry in the outbound mutation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMutation {
    /// Queue sequence number (assigned by the store; realizes FIFO).
    pub seq: i64,

    /// Stable mutation id (UUID v4). The remote side deduplicates on this,
    /// which is what makes at-least-once delivery safe.
    pub id: String,

    /// Collection the mutated record belongs to.
    pub collection: Collection,

    /// Id of the mutated record.
    pub record_id: String,

    /// Requested remote operation.
    pub op: MutationOp,

    /// Full record JSON for create/update; absent for delete.
    pub payload: Option<String>,

    /// Number of delivery attempts so far.
    pub attempts: i64,

    /// Last delivery error, if any.
    pub last_error: Option<String>,

    /// Fatally rejected by the remote; kept for manual inspection and
    /// excluded from normal draining.
    pub flagged: bool,

    /// When the mutation was enqueued.
    pub created_at: DateTime<Utc>,
}

impl OutboundMutation {
    /// Builds a create/update mutation carrying the record's full JSON.
    ///
    /// `seq` is 0 until the store persists the entry and assigns the real
    /// queue position.
    pub fn for_record<R: Record>(op: MutationOp, record: &R) -> CoreResult<Self> {
        let payload = serde_json::to_string(record)?;

        Ok(OutboundMutation {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            collection: R::COLLECTION,
            record_id: record.id().to_string(),
            op,
            payload: Some(payload),
            attempts: 0,
            last_error: None,
            flagged: false,
            created_at: Utc::now(),
        })
    }

    /// Builds a delete mutation. Deletes carry no payload.
    pub fn for_delete(collection: Collection, record_id: impl Into<String>) -> Self {
        OutboundMutation {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            collection,
            record_id: record_id.into(),
            op: MutationOp::Delete,
            payload: None,
            attempts: 0,
            last_error: None,
            flagged: false,
            created_at: Utc::now(),
        }
    }

    /// Key identifying the record this mutation targets. Mutations sharing
    /// a key must replay in seq order.
    pub fn record_key(&self) -> (Collection, &str) {
        (self.collection, self.record_id.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Product;

    #[test]
    fn test_mutation_op_round_trip() {
        for op in [MutationOp::Create, MutationOp::Update, MutationOp::Delete] {
            let parsed: MutationOp = op.to_string().parse().unwrap();
            assert_eq!(parsed, op);
        }
        assert!("upsert".parse::<MutationOp>().is_err());
    }

    #[test]
    fn test_for_record_carries_payload() {
        let product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
        let mutation = OutboundMutation::for_record(MutationOp::Create, &product).unwrap();

        assert_eq!(mutation.collection, Collection::Products);
        assert_eq!(mutation.record_id, product.id);
        assert_eq!(mutation.attempts, 0);
        assert!(!mutation.flagged);

        let decoded: Product = serde_json::from_str(mutation.payload.as_deref().unwrap()).unwrap();
        assert_eq!(decoded, product);
    }

    #[test]
    fn test_for_delete_has_no_payload() {
        let mutation = OutboundMutation::for_delete(Collection::Suppliers, "sup-1");
        assert_eq!(mutation.op, MutationOp::Delete);
        assert!(mutation.payload.is_none());
        assert_eq!(mutation.record_key(), (Collection::Suppliers, "sup-1"));
    }

    #[test]
    fn test_mutation_ids_are_unique() {
        let a = OutboundMutation::for_delete(Collection::Products, "p-1");
        let b = OutboundMutation::for_delete(Collection::Products, "p-1");
        assert_ne!(a.id, b.id);
    }
}
