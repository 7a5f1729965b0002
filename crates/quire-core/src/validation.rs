//! # Validation Module
//!
//! Input validation for everything that reaches the engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine entry point                                           │
//! │  └── THIS MODULE: business rules, checked before any write             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stock arithmetic (crate::stock)                              │
//! │  └── on_hand >= reserved on every adjustment                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on quantities                                   │
//! │  ├── UNIQUE constraints (tenant name, email, order number)             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use quire_core::validation::{validate_quantity, validate_tenant_name};
//!
//! validate_tenant_name("Riverside Books").unwrap();
//! validate_quantity("quantity", 5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Rate;
use crate::types::StockIntake;
use crate::{MAX_LINE_ITEMS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const TENANT_NAME_MIN: usize = 2;
pub const TENANT_NAME_MAX: usize = 100;
pub const FULL_NAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a tenant display name.
///
/// ## Rules
/// - Must not be empty
/// - Between 2 and 100 characters after trimming
///
/// ```rust
/// use quire_core::validation::validate_tenant_name;
///
/// assert!(validate_tenant_name("Riverside Books").is_ok());
/// assert!(validate_tenant_name("R").is_err());
/// assert!(validate_tenant_name("   ").is_err());
/// ```
pub fn validate_tenant_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();
    validate_required("name", name)?;

    let len = name.chars().count();
    if len < TENANT_NAME_MIN {
        return Err(ValidationError::TooShort {
            field: "name".to_string(),
            min: TENANT_NAME_MIN,
        });
    }
    if len > TENANT_NAME_MAX {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: TENANT_NAME_MAX,
        });
    }
    Ok(())
}

/// Validates a person's display name.
pub fn validate_full_name(name: &str) -> ValidationResult<()> {
    validate_required("full_name", name)?;
    if name.trim().chars().count() > FULL_NAME_MAX {
        return Err(ValidationError::TooLong {
            field: "full_name".to_string(),
            max: FULL_NAME_MAX,
        });
    }
    Ok(())
}

/// Validates the shape of an email address.
///
/// Only the shape is checked (`local@domain.tld`); deliverability is not.
pub fn validate_email(field: &str, email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_required(field, email)?;

    if email.len() > EMAIL_MAX {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: EMAIL_MAX,
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("must contain @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("must have exactly one @ with a name before it"));
    }

    let dot = domain.rfind('.').ok_or_else(|| invalid("domain must contain a dot"))?;
    if dot == 0 || dot == domain.len() - 1 {
        return Err(invalid("domain is incomplete"));
    }

    Ok(())
}

/// Validates a UUID string.
///
/// ```rust
/// use quire_core::validation::validate_uuid;
///
/// assert!(validate_uuid("tenant_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("tenant_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    validate_required(field, id)?;

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount in cents. Zero is allowed.
///
/// ```rust
/// use quire_core::validation::validate_non_negative_cents;
///
/// assert!(validate_non_negative_cents("cost_price", 0).is_ok());
/// assert!(validate_non_negative_cents("cost_price", -1).is_err());
/// ```
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a strictly positive amount in cents.
pub fn validate_positive_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a rate that must lie in 0..=100%.
pub fn validate_fraction(field: &str, rate: Rate) -> ValidationResult<()> {
    if !rate.is_fraction() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: crate::money::BPS_SCALE as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a sale or purchase order.
///
/// ## Rules
/// - At least one line
/// - At most MAX_LINE_ITEMS
pub fn validate_line_count(field: &str, count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::TooMany {
            field: field.to_string(),
            max: MAX_LINE_ITEMS,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a stock intake before a record is created or topped up.
///
/// ## Rules
/// - quantity >= 0
/// - 0 <= reserved <= quantity
/// - reorder level >= 0
/// - cost price >= 0
/// - profit and discount in 0..=100%
pub fn validate_stock_intake(intake: &StockIntake) -> ValidationResult<()> {
    if intake.quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if intake.quantity_reserved < 0 || intake.quantity_reserved > intake.quantity {
        return Err(ValidationError::Inconsistent {
            field: "quantity_reserved".to_string(),
            reason: "must be between 0 and the quantity on hand".to_string(),
        });
    }

    if intake.reorder_level < 0 {
        return Err(ValidationError::OutOfRange {
            field: "reorder_level".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    validate_non_negative_cents("cost_price", intake.cost_price.cents())?;
    validate_fraction("profit", intake.profit)?;
    validate_fraction("discount", intake.discount)?;

    if let Some(location) = &intake.location {
        if location.chars().count() > 100 {
            return Err(ValidationError::TooLong {
                field: "location".to_string(),
                max: 100,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_validate_tenant_name() {
        assert!(validate_tenant_name("Riverside Books").is_ok());
        assert!(validate_tenant_name("AB").is_ok());

        assert!(matches!(
            validate_tenant_name(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_tenant_name(" A "),
            Err(ValidationError::TooShort { min: 2, .. })
        ));
        assert!(matches!(
            validate_tenant_name(&"A".repeat(101)),
            Err(ValidationError::TooLong { max: 100, .. })
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", "owner@riverside.example").is_ok());
        assert!(validate_email("email", "a.b+c@shop.co.ke").is_ok());

        assert!(validate_email("email", "").is_err());
        assert!(validate_email("email", "no-at-sign").is_err());
        assert!(validate_email("email", "@shop.com").is_err());
        assert!(validate_email("email", "a@b@shop.com").is_err());
        assert!(validate_email("email", "a@shop").is_err());
        assert!(validate_email("email", "a@shop.").is_err());
        assert!(validate_email("email", "a b@shop.com").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", 1).is_ok());
        assert!(validate_quantity("quantity", MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity("quantity", 0).is_err());
        assert!(validate_quantity("quantity", -3).is_err());
        assert!(validate_quantity("quantity", MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(matches!(
            validate_line_count("items", 0),
            Err(ValidationError::Empty { .. })
        ));
        assert!(validate_line_count("items", 1).is_ok());
        assert!(validate_line_count("items", MAX_LINE_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_stock_intake() {
        let ok = StockIntake::new(10, Money::from_cents(1000))
            .with_profit(Rate::from_bps(2500))
            .with_discount(Rate::from_bps(1000))
            .with_reserved(2);
        assert!(validate_stock_intake(&ok).is_ok());

        let reserved_too_high = StockIntake::new(1, Money::from_cents(100)).with_reserved(2);
        assert!(matches!(
            validate_stock_intake(&reserved_too_high),
            Err(ValidationError::Inconsistent { .. })
        ));

        let negative_cost = StockIntake::new(1, Money::from_cents(-1));
        assert!(validate_stock_intake(&negative_cost).is_err());

        let over_discount =
            StockIntake::new(1, Money::from_cents(100)).with_discount(Rate::from_bps(10_001));
        assert!(validate_stock_intake(&over_discount).is_err());

        let negative_quantity = StockIntake::new(-1, Money::from_cents(100));
        assert!(validate_stock_intake(&negative_quantity).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}
