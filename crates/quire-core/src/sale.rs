//! # Sale Pricing
//!
//! Line pricing, totals, change and the sale status machine.
//!
//! ## Line Total
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line_total = unit_price × quantity − discount + tax                   │
//! │                                                                         │
//! │  unit_price  caller-supplied, or the stock record's sale price          │
//! │  discount    optional, absolute amount, at most unit_price × quantity   │
//! │  tax         optional, absolute amount                                  │
//! │                                                                         │
//! │  sale total  = Σ line_total   (always recomputed here)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, SaleStatus};
use crate::validation::{
    validate_email, validate_line_count, validate_non_negative_cents, validate_quantity,
    validate_required, ValidationResult,
};

// =============================================================================
// Request Types
// =============================================================================

/// One line of a sale request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub edition_id: String,
    pub quantity: i64,
    /// Falls back to the stock record's sale price when absent.
    pub unit_price: Option<Money>,
    pub tax: Option<Money>,
    pub discount: Option<Money>,
}

impl SaleLine {
    pub fn new(edition_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            edition_id: edition_id.into(),
            quantity,
            unit_price: None,
            tax: None,
            discount: None,
        }
    }

    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub amount_received: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Header of a sale request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleHeader {
    /// `pending` or `paid`; there is no payment gateway in the loop.
    pub status: SaleStatus,
    pub payment: PaymentDetails,
    pub customer: CustomerInfo,
    /// Total the till computed. Informational only; the stored total is
    /// always recomputed from the lines.
    pub declared_total: Option<Money>,
}

impl SaleHeader {
    /// A paid cash sale with the given amount handed over.
    pub fn cash(amount_received: Money) -> Self {
        SaleHeader {
            status: SaleStatus::Paid,
            payment: PaymentDetails {
                method: PaymentMethod::Cash,
                amount_received: Some(amount_received),
            },
            customer: CustomerInfo::default(),
            declared_total: None,
        }
    }

    /// A pending sale awaiting payment.
    pub fn pending(method: PaymentMethod) -> Self {
        SaleHeader {
            status: SaleStatus::Pending,
            payment: PaymentDetails {
                method,
                amount_received: None,
            },
            customer: CustomerInfo::default(),
            declared_total: None,
        }
    }
}

/// A sale line with every amount resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub line_no: i64,
    pub edition_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub tax: Option<Money>,
    pub discount: Option<Money>,
    pub line_total: Money,
}

// =============================================================================
// Validation
// =============================================================================

/// Checks the request shape before anything is read or written.
///
/// Per-line errors name the line, e.g. `items[1].quantity must be positive`.
pub fn validate_sale_request(header: &SaleHeader, lines: &[SaleLine]) -> ValidationResult<()> {
    if header.status == SaleStatus::Cancelled {
        return Err(ValidationError::Inconsistent {
            field: "status".to_string(),
            reason: "a new sale must be pending or paid".to_string(),
        });
    }

    if let Some(received) = header.payment.amount_received {
        validate_non_negative_cents("amount_received", received.cents())?;
    }

    if let Some(email) = &header.customer.email {
        validate_email("customer_email", email)?;
    }

    validate_line_count("items", lines.len())?;

    for (index, line) in lines.iter().enumerate() {
        validate_line(line).map_err(|e| e.at_line("items", index))?;
    }

    Ok(())
}

fn validate_line(line: &SaleLine) -> ValidationResult<()> {
    validate_required("edition_id", &line.edition_id)?;
    validate_quantity("quantity", line.quantity)?;

    if let Some(price) = line.unit_price {
        validate_non_negative_cents("unit_price", price.cents())?;
    }
    if let Some(tax) = line.tax {
        validate_non_negative_cents("tax", tax.cents())?;
    }
    if let Some(discount) = line.discount {
        validate_non_negative_cents("discount", discount.cents())?;
    }
    Ok(())
}

// =============================================================================
// Pricing
// =============================================================================

/// `unit_price × quantity − discount + tax`.
///
/// ```rust
/// use quire_core::money::Money;
/// use quire_core::sale::line_total;
///
/// let total = line_total(
///     Money::from_cents(1125),
///     2,
///     Some(Money::from_cents(250)),
///     Some(Money::from_cents(100)),
/// )
/// .unwrap();
/// assert_eq!(total.cents(), 2100);
/// ```
pub fn line_total(
    unit_price: Money,
    quantity: i64,
    discount: Option<Money>,
    tax: Option<Money>,
) -> CoreResult<Money> {
    let gross = unit_price
        .checked_multiply_quantity(quantity)
        .ok_or(CoreError::Overflow("line_total"))?;
    let discount = discount.unwrap_or_default();

    if discount > gross {
        return Err(ValidationError::Inconsistent {
            field: "discount".to_string(),
            reason: format!("{} exceeds the line amount {}", discount, gross),
        }
        .into());
    }

    (gross - discount)
        .checked_add(tax.unwrap_or_default())
        .ok_or(CoreError::Overflow("line_total"))
}

/// Resolves a request line into a priced line.
///
/// `fallback_price` is the stock record's sale price, used when the line
/// carries no unit price of its own.
pub fn price_line(line_no: usize, line: &SaleLine, fallback_price: Money) -> CoreResult<PricedLine> {
    let unit_price = line.unit_price.unwrap_or(fallback_price);
    let total = line_total(unit_price, line.quantity, line.discount, line.tax).map_err(|e| match e {
        CoreError::Validation(v) => CoreError::Validation(v.at_line("items", line_no)),
        other => other,
    })?;

    Ok(PricedLine {
        line_no: line_no as i64,
        edition_id: line.edition_id.clone(),
        quantity: line.quantity,
        unit_price,
        tax: line.tax,
        discount: line.discount,
        line_total: total,
    })
}

/// Σ line totals.
pub fn sale_total(lines: &[PricedLine]) -> CoreResult<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        acc.checked_add(line.line_total)
            .ok_or(CoreError::Overflow("total_amount"))
    })
}

/// Change owed to the customer.
///
/// A `paid` sale must have received at least the total; when nothing was
/// recorded as received, no change is computed.
pub fn change_due(status: SaleStatus, total: Money, received: Option<Money>) -> CoreResult<Option<Money>> {
    match received {
        None => Ok(None),
        Some(received) if status == SaleStatus::Paid && received < total => {
            Err(ValidationError::Inconsistent {
                field: "amount_received".to_string(),
                reason: format!("{} is less than the total {}", received, total),
            }
            .into())
        }
        Some(received) if received >= total => Ok(Some(received - total)),
        Some(_) => Ok(Some(Money::zero())),
    }
}

// =============================================================================
// Status Machine
// =============================================================================

impl SaleStatus {
    /// ```text
    /// pending ──► paid
    ///    │          │
    ///    └──────────┴──► cancelled
    /// ```
    pub const fn can_transition_to(&self, next: SaleStatus) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pending, SaleStatus::Paid)
                | (SaleStatus::Pending, SaleStatus::Cancelled)
                | (SaleStatus::Paid, SaleStatus::Cancelled)
        )
    }

    pub fn transition(&self, next: SaleStatus) -> CoreResult<SaleStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                entity: "Sale",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_plain() {
        assert_eq!(
            line_total(Money::from_cents(1099), 3, None, None).unwrap().cents(),
            3297
        );
    }

    #[test]
    fn test_line_total_discount_cannot_exceed_gross() {
        let err = line_total(Money::from_cents(100), 1, Some(Money::from_cents(101)), None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Inconsistent { .. })));
    }

    #[test]
    fn test_price_line_uses_fallback_price() {
        let line = SaleLine::new("e1", 2);
        let priced = price_line(0, &line, Money::from_cents(1125)).unwrap();
        assert_eq!(priced.unit_price.cents(), 1125);
        assert_eq!(priced.line_total.cents(), 2250);

        let line = SaleLine::new("e1", 2).with_unit_price(Money::from_cents(1000));
        let priced = price_line(0, &line, Money::from_cents(1125)).unwrap();
        assert_eq!(priced.line_total.cents(), 2000);
    }

    #[test]
    fn test_price_line_error_names_line() {
        let line = SaleLine::new("e1", 1)
            .with_unit_price(Money::from_cents(100))
            .with_discount(Money::from_cents(500));
        let err = price_line(3, &line, Money::zero()).unwrap_err();
        assert!(err.to_string().contains("items[3].discount"));
    }

    #[test]
    fn test_sale_total_and_change() {
        let lines = vec![
            price_line(0, &SaleLine::new("e1", 1), Money::from_cents(1000)).unwrap(),
            price_line(1, &SaleLine::new("e2", 2), Money::from_cents(250)).unwrap(),
        ];
        let total = sale_total(&lines).unwrap();
        assert_eq!(total.cents(), 1500);

        assert_eq!(
            change_due(SaleStatus::Paid, total, Some(Money::from_cents(2000))).unwrap(),
            Some(Money::from_cents(500))
        );
        assert_eq!(change_due(SaleStatus::Pending, total, None).unwrap(), None);
        assert!(change_due(SaleStatus::Paid, total, Some(Money::from_cents(1499))).is_err());
        // a pending sale may record a deposit
        assert_eq!(
            change_due(SaleStatus::Pending, total, Some(Money::from_cents(500))).unwrap(),
            Some(Money::zero())
        );
    }

    #[test]
    fn test_validate_sale_request() {
        let header = SaleHeader::cash(Money::from_cents(1000));
        assert!(validate_sale_request(&header, &[SaleLine::new("e1", 1)]).is_ok());

        assert!(matches!(
            validate_sale_request(&header, &[]),
            Err(ValidationError::Empty { .. })
        ));

        let err = validate_sale_request(&header, &[SaleLine::new("e1", 1), SaleLine::new("e2", 0)])
            .unwrap_err();
        assert_eq!(err.to_string(), "items[1].quantity must be positive");

        let mut cancelled = header.clone();
        cancelled.status = SaleStatus::Cancelled;
        assert!(validate_sale_request(&cancelled, &[SaleLine::new("e1", 1)]).is_err());
    }

    #[test]
    fn test_sale_status_transitions() {
        assert!(SaleStatus::Pending.can_transition_to(SaleStatus::Paid));
        assert!(SaleStatus::Pending.can_transition_to(SaleStatus::Cancelled));
        assert!(SaleStatus::Paid.can_transition_to(SaleStatus::Cancelled));

        assert!(!SaleStatus::Paid.can_transition_to(SaleStatus::Pending));
        assert!(!SaleStatus::Cancelled.can_transition_to(SaleStatus::Paid));
        assert!(SaleStatus::Cancelled.transition(SaleStatus::Pending).is_err());
    }
}
