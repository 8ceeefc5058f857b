//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_REMOTE_URL=https://api.example.com                           │
//! │     TALLY_DEVICE_ID=abc-123                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tally.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device_id, 60s poll interval, retry defaults        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Register 1"
//!
//! [business]
//! id = "biz-downtown"
//! name = "Downtown Branch"
//!
//! [sync]
//! remote_url = "https://api.example.com"
//! poll_interval_secs = 60
//! batch_size = 100
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1200
//! backoff_factor = 2.5
//! jitter_ms = 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Register 1", "Back Office").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Business Configuration
// =============================================================================

/// The owning business this installation belongs to. Stamped on every
/// record for multi-tenant isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    /// Unique business identifier.
    pub id: String,

    /// Human-readable business name.
    #[serde(default)]
    pub name: String,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        BusinessConfig {
            id: "default-business".to_string(),
            name: "Default Business".to_string(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync engine behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the remote system of record, if configured.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Interval between scheduled sync cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum queue entries drained per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Whether cycles pull newer remote state after draining.
    #[serde(default = "default_true")]
    pub pull_on_sync: bool,
}

fn default_poll_interval() -> u64 {
    60
}
fn default_batch_size() -> u32 {
    100
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            remote_url: None,
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            pull_on_sync: true,
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry/backoff bounds for network-bound calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempt budget, including the first try.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound of the random addition to every wait (milliseconds).
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1200
}
fn default_backoff_factor() -> f64 {
    2.5
}
fn default_jitter_ms() -> u64 {
    200
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetrySettings {
    /// Builds the runtime policy from these settings.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_factor,
        )
        .jitter(Duration::from_millis(self.jitter_ms))
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Owning business configuration.
    #[serde(default)]
    pub business: BusinessConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Retry/backoff bounds.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(ref raw) = self.sync.remote_url {
            let url = url::Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must be http(s), got: {raw}"
                )));
            }
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(SyncError::InvalidConfig(
                "retry.backoff_factor must be >= 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("TALLY_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(name) = std::env::var("TALLY_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(id) = std::env::var("TALLY_BUSINESS_ID") {
            self.business.id = id;
        }

        if let Ok(url) = std::env::var("TALLY_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = Some(url);
        }

        if let Ok(interval) = std::env::var("TALLY_POLL_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse::<u64>() {
                self.sync.poll_interval_secs = secs;
            }
        }

        if let Ok(batch) = std::env::var("TALLY_BATCH_SIZE") {
            if let Ok(size) = batch.parse::<u32>() {
                self.sync.batch_size = size;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the owning business ID.
    pub fn business_id(&self) -> &str {
        &self.business.id
    }

    /// Returns the remote URL if configured.
    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty()); // Auto-generated
        assert_eq!(config.sync.poll_interval_secs, 60);
        assert_eq!(config.sync.batch_size, 100);
        assert!(config.sync.pull_on_sync);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_settings_build_default_policy() {
        let policy = RetrySettings::default().policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1200));
        assert!((policy.backoff_factor - 2.5).abs() < f64::EPSILON);
        assert_eq!(policy.jitter, Duration::from_millis(200));
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        // Empty device ID should fail
        config.device.id = String::new();
        assert!(config.validate().is_err());
        config.device.id = "device-1".to_string();

        // Non-http(s) URL should fail
        config.sync.remote_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());

        // Valid URL should pass
        config.sync.remote_url = Some("https://api.example.com".to_string());
        assert!(config.validate().is_ok());

        // Zero attempt budget should fail
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[retry]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.device.id, config.device.id);
        assert_eq!(parsed.retry.max_attempts, config.retry.max_attempts);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "register-7"

            [sync]
            poll_interval_secs = 15
            "#,
        )
        .unwrap();

        assert_eq!(parsed.device.id, "register-7");
        assert_eq!(parsed.sync.poll_interval_secs, 15);
        assert_eq!(parsed.sync.batch_size, 100); // Default
        assert_eq!(parsed.retry.base_delay_ms, 1200); // Default
    }
}
