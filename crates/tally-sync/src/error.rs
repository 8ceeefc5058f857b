//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │       Engine            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RateLimited    │  │  Store                  │ │
//! │  │  MissingDeviceId│  │  Unavailable    │  │  Channel                │ │
//! │  │  InvalidUrl     │  │  GatewayTimeout │  │                         │ │
//! │  │  ConfigLoad/Save│  │  Transport      │  │  (cycles themselves     │ │
//! │  │                 │  │  Rejected       │  │   never error out)      │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  RemoteError is the retry classifier's input: the first four variants  │
//! │  are retryable, Rejected is fatal and flags the owning mutation.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Remote Error
// =============================================================================

/// Failure reported by the remote system of record (or the transport on
/// the way there). Cloneable so queue bookkeeping and test scripting can
/// hold copies.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The remote is rate limiting this client.
    #[error("Rate limited by remote")]
    RateLimited {
        /// Server-suggested wait, when provided.
        retry_after_ms: Option<u64>,
    },

    /// The remote service is temporarily unavailable (HTTP 503 class).
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),

    /// A gateway timed out waiting for the remote (HTTP 504 class).
    #[error("Gateway timeout")]
    GatewayTimeout,

    /// Transport/network failure: DNS, connection refused, reset mid-flight.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The remote rejected the request outright (HTTP 400 class, e.g.
    /// validation). Never retried.
    #[error("Rejected by remote: {reason}")]
    Rejected { reason: String },
}

impl RemoteError {
    /// Whether the retry policy may retry this failure.
    ///
    /// ## Retryable
    /// - Rate limiting, service unavailable, gateway timeout, transport
    ///
    /// ## Fatal
    /// - Rejected (validation-class): retrying cannot succeed; the owning
    ///   mutation is flagged for manual inspection instead
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::Rejected { .. })
    }

    /// Whether this failure means the network itself is down, as opposed
    /// to a responding-but-unhappy remote. Drives the offline status
    /// classification: a cycle where every attempt fails network-class is
    /// `offline`; rate limiting or rejections mean the remote was reached.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::GatewayTimeout)
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync engine and configuration failures.
///
/// Note: a sync *cycle* never returns these - cycles always resolve with a
/// status summary. These surface from setup paths (config load, engine
/// construction) and internal plumbing.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID (required for sync).
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid remote endpoint URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Local store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Channel send/receive failed (engine shut down).
    #[error("Channel error: {0}")]
    Channel(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tally_store::StoreError> for SyncError {
    fn from(err: tally_store::StoreError) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteError::RateLimited { retry_after_ms: None }.is_retryable());
        assert!(RemoteError::Unavailable("maintenance".into()).is_retryable());
        assert!(RemoteError::GatewayTimeout.is_retryable());
        assert!(RemoteError::Transport("connection refused".into()).is_retryable());

        assert!(!RemoteError::Rejected { reason: "bad payload".into() }.is_retryable());
    }

    #[test]
    fn test_network_classification() {
        assert!(RemoteError::Transport("dns".into()).is_network());
        assert!(RemoteError::GatewayTimeout.is_network());

        // The remote answered; the network is fine
        assert!(!RemoteError::RateLimited { retry_after_ms: Some(100) }.is_network());
        assert!(!RemoteError::Rejected { reason: "nope".into() }.is_network());
    }
}
