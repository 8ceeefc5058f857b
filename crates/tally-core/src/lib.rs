//! # tally-core: Pure Domain Types for Tally POS
//!
//! This crate holds the domain model shared by the Local Store and the
//! Sync Engine, as pure types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            UI / business-logic layer (collaborator)             │   │
//! │  │      forms, dashboards, onboarding live outside this core       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CRUD + "sync now"                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ mutation  │  │   error   │  │ validation│  │   │
//! │  │   │  Product  │  │ Outbound  │  │ CoreError │  │   rules   │  │   │
//! │  │   │ Txn/User  │  │ Mutation  │  │Validation │  │  checks   │  │   │
//! │  │   │ Supplier  │  │MutationOp │  │   Error   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE TYPES               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tally-store (durable Local Store, SQLite)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Record types (Product, Transaction, SystemUser, Supplier)
//!   and the [`Collection`] / [`Record`] abstractions
//! - [`mutation`] - The outbound mutation queue entry model
//! - [`error`] - Domain error types
//! - [`validation`] - Record validation rules
//!
//! ## Design Principles
//!
//! 1. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 2. **Integer Money**: All monetary values are in cents (i64)
//! 3. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod mutation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Product` instead of
// `use tally_core::types::Product`

pub use error::{CoreError, CoreResult, ValidationError};
pub use mutation::{MutationOp, OutboundMutation};
pub use types::{
    Collection, Product, Record, Supplier, SystemUser, Transaction, TransactionKind, UserRole,
};
