//! # tally-sync: Sync Engine for Tally POS
//!
//! This crate reconciles the Local Store's outbound mutation queue against
//! the remote system of record, enabling offline-first operation with
//! background synchronization.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   SyncEngine (engine.rs)                         │  │
//! │  │                                                                  │  │
//! │  │  Owns the schedule: interval ticks, sync-now requests, and      │  │
//! │  │  connectivity-regained triggers all funnel into one task        │  │
//! │  │  running cycles strictly sequentially (requests coalesce).      │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  RetryPolicy   │  │ RemoteAdapter  │  │  tally-store           │    │
//! │  │  (retry.rs)    │  │ (remote.rs)    │  │                        │    │
//! │  │                │  │                │  │  offline_queue drain   │    │
//! │  │ Bounded        │  │ Trait the host │  │  pull → put_many       │    │
//! │  │ exponential    │  │ implements for │  │  (remote wins)         │    │
//! │  │ backoff+jitter │  │ its backend    │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  STATUS (to UI):                                                       │
//! │  online | syncing | offline | degraded + last-sync + pending count     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - `SyncEngine` cycles, scheduling, status
//! - [`retry`] - `RetryPolicy`: bounded exponential backoff with jitter
//! - [`remote`] - `RemoteAdapter` trait and pulled-change types
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync and remote error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_store::{Store, StoreConfig};
//! use tally_sync::{SyncConfig, SyncEngine};
//!
//! let store = Store::open(StoreConfig::new("tally.db")).await?;
//! let remote = Arc::new(MyBackendAdapter::new(api_client));
//!
//! let config = SyncConfig::load_or_default(None);
//! let (engine, handle) = SyncEngine::new(store, remote, config);
//! tokio::spawn(engine.run());
//!
//! // UI layer:
//! handle.request_sync();                       // "sync now" button
//! handle.connectivity_changed(true).await;     // host connectivity signal
//! let status = handle.status().await;          // badge: online/syncing/...
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod remote;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BusinessConfig, DeviceConfig, RetrySettings, SyncConfig, SyncSettings};
pub use engine::{CycleSummary, SyncEngine, SyncEngineHandle, SyncState, SyncStatus};
pub use error::{RemoteError, SyncError, SyncResult};
pub use remote::{RemoteAdapter, RemoteChange};
pub use retry::{RetryError, RetryPolicy};
