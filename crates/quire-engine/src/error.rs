//! # Engine Error Types
//!
//! The error surface of every ledger, sale, purchasing and provisioning call.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Lookup        │  │   Stock         │  │   Uniqueness            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  Insufficient-  │  │  DuplicateName          │ │
//! │  │                 │  │  Stock          │  │  DuplicateEmail         │ │
//! │  │                 │  │  Conflict       │  │  DuplicateOrderNumber   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Rules         │  │   Saga          │  │   Infrastructure        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Compensation-  │  │  Storage                │ │
//! │  │  InvalidStatus- │  │  Failure        │  │  Config                 │ │
//! │  │  Transition     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A multi-line operation that fails part way returns ONE error naming the
//! failing line (`line: Some(i)`), never the compensating steps it ran.

use thiserror::Error;

use quire_core::{CoreError, ValidationError};
use quire_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// A referenced tenant, edition, stock record or order does not exist.
    #[error("{entity} not found: {id}{}", line_suffix(.line))]
    NotFound {
        entity: String,
        id: String,
        /// Position of the line item that referenced it, if any.
        line: Option<usize>,
    },

    // =========================================================================
    // Stock Errors
    // =========================================================================
    /// A debit would push on-hand below the reserved quantity.
    #[error(
        "Insufficient stock for edition {edition_id}: available {available}, requested {requested}{}",
        line_suffix(.line)
    )]
    InsufficientStock {
        edition_id: String,
        available: i64,
        requested: i64,
        line: Option<usize>,
    },

    /// The stock row changed between read and write.
    ///
    /// The ledger does not retry; the caller decides whether to.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    // =========================================================================
    // Uniqueness Errors
    // =========================================================================
    #[error("Tenant name already taken: {0}")]
    DuplicateName(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// No free order number after the configured insert attempts.
    #[error("Order number {order_number} already used for tenant {tenant_id}")]
    DuplicateOrderNumber {
        tenant_id: String,
        order_number: String,
    },

    // =========================================================================
    // Rule Errors
    // =========================================================================
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Saga Errors
    // =========================================================================
    /// An undo step failed after all attempts.
    ///
    /// Surfaced only when it is the sole failure of an operation; otherwise it
    /// is logged and the original error wins.
    #[error("Compensation step '{step}' failed: {reason}")]
    CompensationFailure { step: String, reason: String },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(DbError),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(i) => format!(" (line {})", i),
        None => String::new(),
    }
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
            line: None,
        }
    }

    /// Attaches the position of the failing line item.
    ///
    /// Only lookup and stock errors carry a line; validation errors already
    /// name theirs in the field path.
    pub fn at_line(self, index: usize) -> Self {
        match self {
            EngineError::NotFound { entity, id, .. } => EngineError::NotFound {
                entity,
                id,
                line: Some(index),
            },
            EngineError::InsufficientStock {
                edition_id,
                available,
                requested,
                ..
            } => EngineError::InsufficientStock {
                edition_id,
                available,
                requested,
                line: Some(index),
            },
            other => other,
        }
    }

    /// The failing line item, when the error names one.
    pub fn line(&self) -> Option<usize> {
        match self {
            EngineError::NotFound { line, .. } | EngineError::InsufficientStock { line, .. } => *line,
            _ => None,
        }
    }

    /// True if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict { .. }
                | EngineError::Storage(DbError::ConnectionFailed(_))
                | EngineError::Storage(DbError::PoolExhausted)
        )
    }

    /// True if the caller sent something that can never succeed as is.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. }
                | EngineError::InsufficientStock { .. }
                | EngineError::DuplicateName(_)
                | EngineError::DuplicateEmail(_)
                | EngineError::InvalidStatusTransition { .. }
                | EngineError::Validation(_)
        )
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound {
                entity,
                id,
                line: None,
            },
            DbError::VersionConflict { entity, id, .. } => EngineError::Conflict { entity, id },
            other => EngineError::Storage(other),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock { available, requested } => EngineError::InsufficientStock {
                edition_id: String::new(),
                available,
                requested,
                line: None,
            },
            CoreError::InvalidStatusTransition { entity, from, to } => {
                EngineError::InvalidStatusTransition {
                    entity: entity.to_string(),
                    from,
                    to,
                }
            }
            CoreError::MalformedOrderNumber(n) => EngineError::Validation(ValidationError::InvalidFormat {
                field: "order_number".to_string(),
                reason: format!("'{}' is not of the form A0001", n),
            }),
            CoreError::Overflow(what) => EngineError::Validation(ValidationError::OutOfRange {
                field: what.to_string(),
                min: i64::MIN,
                max: i64::MAX,
            }),
            CoreError::Validation(v) => EngineError::Validation(v),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
