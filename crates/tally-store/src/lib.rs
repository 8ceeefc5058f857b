//! # tally-store: Local Store for Tally POS
//!
//! Durable, crash-safe CRUD access to the typed record collections and the
//! outbound mutation queue. SQLite on device, async access via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  UI collaborator (read/write)          Sync engine (drain/pull)        │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │     Store     │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (records.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │ (outbox.rs)   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RecordRepo    │    │ 001_initial  │  │   │
//! │  │   │ WAL mode      │    │ OutboxRepo    │    │ 002_date_idx │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │       SQLite file: one durable store per installation           │   │
//! │  │  Collections: products, transactions, users, suppliers          │   │
//! │  │  Queue: offline_queue   Bookkeeping: sync_meta                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Store handle, pool configuration, sync metadata
//! - [`migrations`] - Embedded schema-version migrations
//! - [`records`] - Collection CRUD and write-and-queue entry points
//! - [`outbox`] - Outbound mutation queue
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_store::{Store, StoreConfig};
//! use tally_core::{MutationOp, Product};
//!
//! let store = Store::open(StoreConfig::new("path/to/tally.db")).await?;
//!
//! // Local write that must reach the remote: one atomic transaction
//! let product = Product::new("biz-1", "COKE-330", "Coca-Cola 330ml", 199);
//! store.records().save_and_queue(&product, MutationOp::Create).await?;
//!
//! // Reads never fail - storage errors mean "nothing cached yet"
//! let products: Vec<Product> = store.records().get_all().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod outbox;
pub mod pool;
pub mod records;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use outbox::OutboxRepository;
pub use pool::{Store, StoreConfig};
pub use records::RecordRepository;
