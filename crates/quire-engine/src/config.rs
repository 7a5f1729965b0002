//! # Engine Configuration
//!
//! Configuration management for the Quire engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     QUIRE_DATABASE_PATH=/var/lib/quire/quire.db                        │
//! │     QUIRE_DEBIT_CONFLICT_RETRIES=2                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/quire/engine.toml (Linux)                                │
//! │     ~/Library/Application Support/com.quire.quire/engine.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [database]
//! path = "quire.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! compensation_attempts = 3
//! debit_conflict_retries = 0
//!
//! [purchasing]
//! delivery_lead_days = 5
//! order_number_attempts = 16
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use quire_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` opens a throwaway in-memory database.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on SQLite's lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "quire", "quire")
        .map(|dirs| dirs.data_dir().join("quire.db"))
        .unwrap_or_else(|| PathBuf::from("quire.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Attempts per undo step before a compensation is reported as failed.
    #[serde(default = "default_compensation_attempts")]
    pub compensation_attempts: u32,

    /// Extra attempts a sale makes when a debit hits a version conflict.
    /// 0 leaves retrying to the caller.
    #[serde(default)]
    pub debit_conflict_retries: u32,
}

fn default_compensation_attempts() -> u32 {
    3
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            compensation_attempts: default_compensation_attempts(),
            debit_conflict_retries: 0,
        }
    }
}

// =============================================================================
// Purchasing Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasingSettings {
    /// Days added to the order date when no delivery date is given.
    #[serde(default = "default_delivery_lead_days")]
    pub delivery_lead_days: i64,

    /// Order numbers tried before giving up with `DuplicateOrderNumber`.
    #[serde(default = "default_order_number_attempts")]
    pub order_number_attempts: u32,
}

fn default_delivery_lead_days() -> i64 {
    quire_core::DEFAULT_DELIVERY_LEAD_DAYS
}

fn default_order_number_attempts() -> u32 {
    16
}

impl Default for PurchasingSettings {
    fn default() -> Self {
        PurchasingSettings {
            delivery_lead_days: default_delivery_lead_days(),
            order_number_attempts: default_order_number_attempts(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub purchasing: PurchasingSettings,
}

impl EngineConfig {
    /// Defaults with an in-memory database, for tests and demos.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(EngineError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.ledger.compensation_attempts == 0 {
            return Err(EngineError::Config(
                "ledger.compensation_attempts must be greater than 0".into(),
            ));
        }
        if self.purchasing.delivery_lead_days < 0 {
            return Err(EngineError::Config(
                "purchasing.delivery_lead_days must not be negative".into(),
            ));
        }
        if self.purchasing.order_number_attempts == 0 {
            return Err(EngineError::Config(
                "purchasing.order_number_attempts must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Applies `QUIRE_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("QUIRE_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        override_number(&lookup, "QUIRE_DB_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_number(&lookup, "QUIRE_DB_BUSY_TIMEOUT_MS", &mut self.database.busy_timeout_ms);
        override_number(
            &lookup,
            "QUIRE_COMPENSATION_ATTEMPTS",
            &mut self.ledger.compensation_attempts,
        );
        override_number(
            &lookup,
            "QUIRE_DEBIT_CONFLICT_RETRIES",
            &mut self.ledger.debit_conflict_retries,
        );
        override_number(
            &lookup,
            "QUIRE_DELIVERY_LEAD_DAYS",
            &mut self.purchasing.delivery_lead_days,
        );
        override_number(
            &lookup,
            "QUIRE_ORDER_NUMBER_ATTEMPTS",
            &mut self.purchasing.order_number_attempts,
        );
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "quire", "quire")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Connection settings for `quire_db::Database::new`.
    pub fn db_config(&self) -> DbConfig {
        if self.database.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse::<T>() {
            Ok(value) => {
                debug!(key, value = %raw, "Overriding from environment");
                *target = value;
            }
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}
