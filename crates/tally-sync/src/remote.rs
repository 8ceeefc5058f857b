//! # Remote Adapter
//!
//! The interface to the remote system of record. The host application
//! implements this over its actual backend client; the sync engine only
//! ever talks through the trait.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       RemoteAdapter Contract                            │
//! │                                                                         │
//! │  insert / update / delete                                              │
//! │  ├── idempotent per mutation id: re-sending a delivered mutation       │
//! │  │   must be a no-op on the remote (at-least-once delivery relies     │
//! │  │   on this)                                                          │
//! │  └── failures typed as RemoteError for retry classification            │
//! │                                                                         │
//! │  fetch_since(collection, since)                                        │
//! │  └── returns records changed after `since` (None = everything);        │
//! │      deletions are tombstones with `deleted = true`                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::Collection;

use crate::error::RemoteError;

// =============================================================================
// Remote Change
// =============================================================================

/// One record-level change pulled from the remote system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChange {
    /// Collection the change belongs to.
    pub collection: Collection,

    /// Id of the changed record.
    pub record_id: String,

    /// Full record JSON; `None` for tombstones.
    pub payload: Option<String>,

    /// True if the record was deleted remotely.
    pub deleted: bool,

    /// When the change was accepted by the remote.
    pub changed_at: DateTime<Utc>,
}

impl RemoteChange {
    /// An upsert change carrying the record JSON.
    pub fn upsert(
        collection: Collection,
        record_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        RemoteChange {
            collection,
            record_id: record_id.into(),
            payload: Some(payload.into()),
            deleted: false,
            changed_at: Utc::now(),
        }
    }

    /// A deletion tombstone.
    pub fn tombstone(collection: Collection, record_id: impl Into<String>) -> Self {
        RemoteChange {
            collection,
            record_id: record_id.into(),
            payload: None,
            deleted: true,
            changed_at: Utc::now(),
        }
    }
}

// =============================================================================
// Remote Adapter Trait
// =============================================================================

/// The remote system of record, as seen by the sync engine.
///
/// All operations are assumed idempotent per `mutation_id`; the sync
/// engine re-delivers after interruptions and the remote must deduplicate.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Creates a record remotely.
    async fn insert(
        &self,
        collection: Collection,
        mutation_id: &str,
        record_id: &str,
        payload: &str,
    ) -> Result<(), RemoteError>;

    /// Updates a record remotely.
    async fn update(
        &self,
        collection: Collection,
        mutation_id: &str,
        record_id: &str,
        payload: &str,
    ) -> Result<(), RemoteError>;

    /// Deletes a record remotely.
    async fn delete(
        &self,
        collection: Collection,
        mutation_id: &str,
        record_id: &str,
    ) -> Result<(), RemoteError>;

    /// Returns changes accepted by the remote after `since`
    /// (`None` = full snapshot).
    async fn fetch_since(
        &self,
        collection: Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteChange>, RemoteError>;
}

// =============================================================================
// Scripted Mock (tests)
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory remote for sync-cycle tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use tally_core::MutationOp;

    use super::*;

    /// One observed remote call.
    #[derive(Debug, Clone)]
    pub struct RemoteCall {
        pub op: MutationOp,
        pub collection: Collection,
        pub mutation_id: String,
        pub record_id: String,
        pub payload: Option<String>,
    }

    #[derive(Default)]
    struct MockState {
        /// Every call that REACHED the remote, in arrival order.
        calls: Vec<RemoteCall>,
        /// Scripted failures per record id, consumed front to back.
        fail_plan: HashMap<String, Vec<RemoteError>>,
        /// Record ids that always fail fatally.
        reject_always: HashMap<String, String>,
        /// Per record id: next N calls are received (recorded) but the
        /// response is lost - the caller sees a transport error. Simulates
        /// interruption after send, before confirmation.
        drop_response: HashMap<String, u32>,
        /// Network down: nothing reaches the remote at all.
        offline: bool,
        /// Scripted pull results per collection.
        pull: HashMap<Collection, Vec<RemoteChange>>,
    }

    /// Scripted remote: records calls, fails on cue.
    #[derive(Default)]
    pub struct MockRemote {
        state: Mutex<MockState>,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues `times` retryable failures for a record id.
        pub fn fail_next(&self, record_id: &str, error: RemoteError, times: u32) {
            let mut state = self.state.lock().unwrap();
            let plan = state.fail_plan.entry(record_id.to_string()).or_default();
            for _ in 0..times {
                plan.push(error.clone());
            }
        }

        /// Makes every mutation for a record id fail fatally.
        pub fn reject_always(&self, record_id: &str, reason: &str) {
            self.state
                .lock()
                .unwrap()
                .reject_always
                .insert(record_id.to_string(), reason.to_string());
        }

        /// The next `times` calls for a record id arrive but their
        /// responses are lost.
        pub fn drop_response(&self, record_id: &str, times: u32) {
            self.state
                .lock()
                .unwrap()
                .drop_response
                .insert(record_id.to_string(), times);
        }

        /// Simulates total network loss (true) or recovery (false).
        pub fn set_offline(&self, offline: bool) {
            self.state.lock().unwrap().offline = offline;
        }

        /// Scripts the next pull result for a collection.
        pub fn set_pull(&self, collection: Collection, changes: Vec<RemoteChange>) {
            self.state.lock().unwrap().pull.insert(collection, changes);
        }

        /// All calls that reached the remote, in order.
        pub fn calls(&self) -> Vec<RemoteCall> {
            self.state.lock().unwrap().calls.clone()
        }

        /// Calls that reached the remote for one record id, in order.
        pub fn calls_for(&self, record_id: &str) -> Vec<RemoteCall> {
            self.calls()
                .into_iter()
                .filter(|c| c.record_id == record_id)
                .collect()
        }

        fn apply(
            &self,
            op: MutationOp,
            collection: Collection,
            mutation_id: &str,
            record_id: &str,
            payload: Option<&str>,
        ) -> Result<(), RemoteError> {
            let mut state = self.state.lock().unwrap();

            if state.offline {
                // Request never left the device
                return Err(RemoteError::Transport("network unreachable".into()));
            }

            if let Some(reason) = state.reject_always.get(record_id).cloned() {
                return Err(RemoteError::Rejected { reason });
            }

            if let Some(plan) = state.fail_plan.get_mut(record_id) {
                if !plan.is_empty() {
                    return Err(plan.remove(0));
                }
            }

            let confirmation_lost = match state.drop_response.get_mut(record_id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };

            // The call reached the remote either way
            state.calls.push(RemoteCall {
                op,
                collection,
                mutation_id: mutation_id.to_string(),
                record_id: record_id.to_string(),
                payload: payload.map(str::to_string),
            });

            if confirmation_lost {
                return Err(RemoteError::Transport("connection reset by peer".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteAdapter for MockRemote {
        async fn insert(
            &self,
            collection: Collection,
            mutation_id: &str,
            record_id: &str,
            payload: &str,
        ) -> Result<(), RemoteError> {
            self.apply(MutationOp::Create, collection, mutation_id, record_id, Some(payload))
        }

        async fn update(
            &self,
            collection: Collection,
            mutation_id: &str,
            record_id: &str,
            payload: &str,
        ) -> Result<(), RemoteError> {
            self.apply(MutationOp::Update, collection, mutation_id, record_id, Some(payload))
        }

        async fn delete(
            &self,
            collection: Collection,
            mutation_id: &str,
            record_id: &str,
        ) -> Result<(), RemoteError> {
            self.apply(MutationOp::Delete, collection, mutation_id, record_id, None)
        }

        async fn fetch_since(
            &self,
            collection: Collection,
            _since: Option<DateTime<Utc>>,
        ) -> Result<Vec<RemoteChange>, RemoteError> {
            let state = self.state.lock().unwrap();
            if state.offline {
                return Err(RemoteError::Transport("network unreachable".into()));
            }
            Ok(state.pull.get(&collection).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_constructors() {
        let up = RemoteChange::upsert(Collection::Products, "p-1", "{}");
        assert!(!up.deleted);
        assert!(up.payload.is_some());

        let gone = RemoteChange::tombstone(Collection::Products, "p-1");
        assert!(gone.deleted);
        assert!(gone.payload.is_none());
    }
}
