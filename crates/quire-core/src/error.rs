//! # Error Types
//!
//! Domain-specific error types for quire-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  quire-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger and state machine rule violations       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  quire-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  quire-engine errors                                                   │
//! │  └── EngineError      - What callers of the engine see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Rule violations detected by pure ledger and state machine logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A debit would push on-hand below the reserved quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 5 copies of an edition
    ///      │
    ///      ▼
    /// on_hand=6, reserved=3 → available=3
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// A status change outside the allowed transition set.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// An order number that does not follow the `A0001` format.
    #[error("Malformed order number: {0}")]
    MalformedOrderNumber(String),

    /// Arithmetic left the representable range.
    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation so a rejected request never has side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A line item list was empty.
    #[error("{field} must contain at least one item")]
    Empty { field: String },

    /// Too many entries in a list.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },

    /// Two related values contradict each other.
    #[error("{field}: {reason}")]
    Inconsistent { field: String, reason: String },
}

impl ValidationError {
    /// Prefixes the field name with a line position, e.g. `items[2].quantity`.
    pub fn at_line(self, list: &str, index: usize) -> Self {
        let prefix = |field: String| format!("{}[{}].{}", list, index, field);
        match self {
            ValidationError::Required { field } => ValidationError::Required { field: prefix(field) },
            ValidationError::TooShort { field, min } => ValidationError::TooShort {
                field: prefix(field),
                min,
            },
            ValidationError::TooLong { field, max } => ValidationError::TooLong {
                field: prefix(field),
                max,
            },
            ValidationError::OutOfRange { field, min, max } => ValidationError::OutOfRange {
                field: prefix(field),
                min,
                max,
            },
            ValidationError::MustBePositive { field } => ValidationError::MustBePositive {
                field: prefix(field),
            },
            ValidationError::InvalidFormat { field, reason } => ValidationError::InvalidFormat {
                field: prefix(field),
                reason,
            },
            ValidationError::Empty { field } => ValidationError::Empty { field: prefix(field) },
            ValidationError::TooMany { field, max } => ValidationError::TooMany {
                field: prefix(field),
                max,
            },
            ValidationError::Inconsistent { field, reason } => ValidationError::Inconsistent {
                field: prefix(field),
                reason,
            },
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
