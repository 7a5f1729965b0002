//! # Purchasing
//!
//! Order numbers, delivery dates, totals, the purchase order status machine
//! and receipt planning.
//!
//! ## Order Numbers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq   1 → "A0001"                                                      │
//! │  seq  42 → "A0042"                                                      │
//! │  seq 9999 → "A9999"                                                     │
//! │  seq 10000 → "A10000"   (keeps growing; orders sort by seq)            │
//! │                                                                         │
//! │  Per tenant, strictly increasing, never reused.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PurchaseOrderItem, PurchaseOrderStatus};
use crate::validation::{
    validate_line_count, validate_positive_cents, validate_quantity, validate_required, ValidationResult,
};

// =============================================================================
// Order Number
// =============================================================================

/// A per-tenant purchase order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderNumber(i64);

impl OrderNumber {
    pub const PREFIX: char = 'A';

    /// `A0001`.
    pub const fn first() -> Self {
        OrderNumber(1)
    }

    /// Builds an order number from its sequence. Sequences start at 1.
    pub fn from_seq(seq: i64) -> CoreResult<Self> {
        if seq < 1 {
            return Err(CoreError::MalformedOrderNumber(seq.to_string()));
        }
        Ok(OrderNumber(seq))
    }

    pub const fn seq(&self) -> i64 {
        self.0
    }

    /// The number after `latest`, or `A0001` when there is none.
    ///
    /// ```rust
    /// use quire_core::purchasing::OrderNumber;
    ///
    /// assert_eq!(OrderNumber::next_after(None).unwrap().to_string(), "A0001");
    /// let latest: OrderNumber = "A0041".parse().unwrap();
    /// assert_eq!(OrderNumber::next_after(Some(latest)).unwrap().to_string(), "A0042");
    /// ```
    pub fn next_after(latest: Option<OrderNumber>) -> CoreResult<Self> {
        match latest {
            None => Ok(Self::first()),
            Some(n) => n
                .0
                .checked_add(1)
                .map(OrderNumber)
                .ok_or(CoreError::Overflow("order_number")),
        }
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", Self::PREFIX, self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedOrderNumber(s.to_string());

        let digits = s.strip_prefix(Self::PREFIX).ok_or_else(malformed)?;
        if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }

        let seq: i64 = digits.parse().map_err(|_| malformed())?;
        Self::from_seq(seq).map_err(|_| malformed())
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// One line of a purchase order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderLine {
    pub edition_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
}

impl PurchaseOrderLine {
    pub fn new(edition_id: impl Into<String>, quantity: i64, unit_cost: Money) -> Self {
        PurchaseOrderLine {
            edition_id: edition_id.into(),
            quantity,
            unit_cost,
        }
    }
}

/// A purchase order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseOrder {
    pub supplier_id: String,
    pub items: Vec<PurchaseOrderLine>,
    /// Defaults to now.
    #[ts(as = "Option<String>")]
    pub order_date: Option<DateTime<Utc>>,
    /// Defaults to the order date plus the configured lead time.
    #[ts(as = "Option<String>")]
    pub expected_delivery_date: Option<DateTime<Utc>>,
    /// Ignored; the stored total is always recomputed from the lines.
    pub declared_total: Option<Money>,
}

impl NewPurchaseOrder {
    pub fn new(supplier_id: impl Into<String>, items: Vec<PurchaseOrderLine>) -> Self {
        NewPurchaseOrder {
            supplier_id: supplier_id.into(),
            items,
            order_date: None,
            expected_delivery_date: None,
            declared_total: None,
        }
    }
}

/// Quantity of one edition delivered against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLine {
    pub edition_id: String,
    pub quantity: i64,
}

impl ReceiptLine {
    pub fn new(edition_id: impl Into<String>, quantity: i64) -> Self {
        ReceiptLine {
            edition_id: edition_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Validation & Totals
// =============================================================================

pub fn validate_purchase_order(order: &NewPurchaseOrder) -> ValidationResult<()> {
    validate_required("supplier_id", &order.supplier_id)?;
    validate_line_count("items", order.items.len())?;

    for (index, line) in order.items.iter().enumerate() {
        validate_order_line(line).map_err(|e| e.at_line("items", index))?;
    }

    if let (Some(ordered), Some(expected)) = (order.order_date, order.expected_delivery_date) {
        if expected < ordered {
            return Err(ValidationError::Inconsistent {
                field: "expected_delivery_date".to_string(),
                reason: "must not be before the order date".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_order_line(line: &PurchaseOrderLine) -> ValidationResult<()> {
    validate_required("edition_id", &line.edition_id)?;
    validate_quantity("quantity", line.quantity)?;
    validate_positive_cents("unit_cost", line.unit_cost.cents())
}

/// Σ unit_cost × quantity.
///
/// ```rust
/// use quire_core::money::Money;
/// use quire_core::purchasing::{order_total, PurchaseOrderLine};
///
/// let lines = vec![
///     PurchaseOrderLine::new("e1", 10, Money::from_cents(450)),
///     PurchaseOrderLine::new("e2", 3, Money::from_cents(1200)),
/// ];
/// assert_eq!(order_total(&lines).unwrap().cents(), 8100);
/// ```
pub fn order_total(lines: &[PurchaseOrderLine]) -> CoreResult<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        line.unit_cost
            .checked_multiply_quantity(line.quantity)
            .and_then(|amount| acc.checked_add(amount))
            .ok_or(CoreError::Overflow("total_amount"))
    })
}

/// The supplied date, or `order_date + lead_days`.
pub fn expected_delivery(
    order_date: DateTime<Utc>,
    supplied: Option<DateTime<Utc>>,
    lead_days: i64,
) -> DateTime<Utc> {
    supplied.unwrap_or_else(|| order_date + Duration::days(lead_days))
}

// =============================================================================
// Status Machine
// =============================================================================

impl PurchaseOrderStatus {
    /// ```text
    /// pending  → approved | cancelled
    /// approved → partial | received | cancelled
    /// partial  → received | cancelled
    /// received, cancelled, completed: terminal
    /// ```
    pub const fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Partial)
                | (Approved, Received)
                | (Approved, Cancelled)
                | (Partial, Received)
                | (Partial, Cancelled)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled | PurchaseOrderStatus::Completed
        )
    }

    /// True when deliveries may be booked against the order.
    pub const fn accepts_receipts(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Approved | PurchaseOrderStatus::Partial)
    }

    pub fn transition(&self, next: PurchaseOrderStatus) -> CoreResult<PurchaseOrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                entity: "PurchaseOrder",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

// =============================================================================
// Receipt Planning
// =============================================================================

/// Quantity booked against one order item.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptAllocation {
    pub item_id: String,
    pub edition_id: String,
    pub quantity: i64,
    pub unit_cost: Money,
    pub quantity_received_after: i64,
}

/// The effect of a delivery on an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPlan {
    pub allocations: Vec<ReceiptAllocation>,
    pub next_status: PurchaseOrderStatus,
}

/// Spreads delivered quantities over the order's items.
///
/// Each receipt line is booked against the items for its edition in line
/// order, filling the outstanding quantity of one before moving to the next.
///
/// ## Errors
/// - `InvalidStatusTransition` if the order is not approved or partial
/// - `Validation` for an empty delivery, an edition not on the order, or a
///   quantity larger than what is still outstanding
pub fn plan_receipt(
    status: PurchaseOrderStatus,
    items: &[PurchaseOrderItem],
    receipts: &[ReceiptLine],
) -> CoreResult<ReceiptPlan> {
    if !status.accepts_receipts() {
        return Err(CoreError::InvalidStatusTransition {
            entity: "PurchaseOrder",
            from: status.to_string(),
            to: PurchaseOrderStatus::Received.to_string(),
        });
    }

    validate_line_count("receipts", receipts.len())?;

    let mut received: Vec<i64> = items.iter().map(|i| i.quantity_received).collect();
    let mut allocations = Vec::new();

    for (index, receipt) in receipts.iter().enumerate() {
        validate_required("edition_id", &receipt.edition_id)
            .and_then(|_| validate_quantity("quantity", receipt.quantity))
            .map_err(|e| e.at_line("receipts", index))?;

        let matching: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.edition_id == receipt.edition_id)
            .map(|(i, _)| i)
            .collect();

        if matching.is_empty() {
            return Err(ValidationError::Inconsistent {
                field: format!("receipts[{}].edition_id", index),
                reason: format!("edition {} is not on this order", receipt.edition_id),
            }
            .into());
        }

        let outstanding: i64 = matching
            .iter()
            .map(|&i| items[i].quantity_ordered - received[i])
            .sum();
        if receipt.quantity > outstanding {
            return Err(ValidationError::Inconsistent {
                field: format!("receipts[{}].quantity", index),
                reason: format!(
                    "receiving {} exceeds the {} still outstanding",
                    receipt.quantity, outstanding
                ),
            }
            .into());
        }

        let mut remaining = receipt.quantity;
        for i in matching {
            if remaining == 0 {
                break;
            }
            let open = items[i].quantity_ordered - received[i];
            let take = remaining.min(open);
            if take == 0 {
                continue;
            }
            received[i] += take;
            remaining -= take;
            allocations.push(ReceiptAllocation {
                item_id: items[i].id.clone(),
                edition_id: items[i].edition_id.clone(),
                quantity: take,
                unit_cost: items[i].unit_cost(),
                quantity_received_after: received[i],
            });
        }
    }

    let complete = items
        .iter()
        .zip(&received)
        .all(|(item, got)| *got >= item.quantity_ordered);

    let next_status = if complete {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::Partial
    };

    Ok(ReceiptPlan {
        allocations,
        next_status,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, edition: &str, ordered: i64, received: i64) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: id.to_string(),
            po_id: "po".to_string(),
            line_no: 0,
            edition_id: edition.to_string(),
            quantity_ordered: ordered,
            quantity_received: received,
            unit_cost_cents: 400,
        }
    }

    #[test]
    fn test_order_number_format_and_parse() {
        assert_eq!(OrderNumber::first().to_string(), "A0001");
        assert_eq!(OrderNumber::from_seq(42).unwrap().to_string(), "A0042");
        assert_eq!(OrderNumber::from_seq(10_000).unwrap().to_string(), "A10000");

        assert_eq!("A0042".parse::<OrderNumber>().unwrap().seq(), 42);
        assert_eq!("A10000".parse::<OrderNumber>().unwrap().seq(), 10_000);

        assert!("0042".parse::<OrderNumber>().is_err());
        assert!("A42".parse::<OrderNumber>().is_err());
        assert!("A00x1".parse::<OrderNumber>().is_err());
        assert!("A0000".parse::<OrderNumber>().is_err());
    }

    #[test]
    fn test_order_numbers_sort_by_sequence() {
        let a: OrderNumber = "A9999".parse().unwrap();
        let b: OrderNumber = "A10000".parse().unwrap();
        assert!(a < b);
        assert_eq!(OrderNumber::next_after(Some(a)).unwrap(), b);
    }

    #[test]
    fn test_expected_delivery_default() {
        let ordered = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            expected_delivery(ordered, None, 5),
            Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap()
        );
        let supplied = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        assert_eq!(expected_delivery(ordered, Some(supplied), 5), supplied);
    }

    #[test]
    fn test_validate_purchase_order() {
        let ok = NewPurchaseOrder::new("sup-1", vec![PurchaseOrderLine::new("e1", 5, Money::from_cents(300))]);
        assert!(validate_purchase_order(&ok).is_ok());

        let no_items = NewPurchaseOrder::new("sup-1", vec![]);
        assert!(validate_purchase_order(&no_items).is_err());

        let free = NewPurchaseOrder::new("sup-1", vec![PurchaseOrderLine::new("e1", 5, Money::zero())]);
        assert_eq!(
            validate_purchase_order(&free).unwrap_err().to_string(),
            "items[0].unit_cost must be positive"
        );

        let mut backwards = ok.clone();
        backwards.order_date = Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
        backwards.expected_delivery_date = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert!(validate_purchase_order(&backwards).is_err());
    }

    #[test]
    fn test_status_machine() {
        use PurchaseOrderStatus::*;

        let allowed = [
            (Pending, Approved),
            (Pending, Cancelled),
            (Approved, Partial),
            (Approved, Received),
            (Approved, Cancelled),
            (Partial, Received),
            (Partial, Cancelled),
        ];
        let all = [Pending, Approved, Received, Partial, Completed, Cancelled];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }

        assert!(Received.is_terminal() && Cancelled.is_terminal() && Completed.is_terminal());
        assert!(matches!(
            Received.transition(Pending),
            Err(CoreError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_plan_receipt_partial_then_full() {
        let items = vec![item("i1", "e1", 10, 0), item("i2", "e2", 4, 0)];

        let plan = plan_receipt(PurchaseOrderStatus::Approved, &items, &[ReceiptLine::new("e1", 6)]).unwrap();
        assert_eq!(plan.next_status, PurchaseOrderStatus::Partial);
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].quantity_received_after, 6);

        let items = vec![item("i1", "e1", 10, 6), item("i2", "e2", 4, 0)];
        let plan = plan_receipt(
            PurchaseOrderStatus::Partial,
            &items,
            &[ReceiptLine::new("e1", 4), ReceiptLine::new("e2", 4)],
        )
        .unwrap();
        assert_eq!(plan.next_status, PurchaseOrderStatus::Received);
        assert_eq!(plan.allocations.len(), 2);
    }

    #[test]
    fn test_plan_receipt_spreads_over_duplicate_editions() {
        let items = vec![item("i1", "e1", 3, 0), item("i2", "e1", 5, 0)];
        let plan = plan_receipt(PurchaseOrderStatus::Approved, &items, &[ReceiptLine::new("e1", 5)]).unwrap();
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].quantity, 3);
        assert_eq!(plan.allocations[1].quantity, 2);
    }

    #[test]
    fn test_plan_receipt_rejections() {
        let items = vec![item("i1", "e1", 10, 8)];

        assert!(matches!(
            plan_receipt(PurchaseOrderStatus::Pending, &items, &[ReceiptLine::new("e1", 1)]),
            Err(CoreError::InvalidStatusTransition { .. })
        ));
        assert!(matches!(
            plan_receipt(PurchaseOrderStatus::Partial, &items, &[ReceiptLine::new("e1", 3)]),
            Err(CoreError::Validation(ValidationError::Inconsistent { .. }))
        ));
        assert!(matches!(
            plan_receipt(PurchaseOrderStatus::Partial, &items, &[ReceiptLine::new("e9", 1)]),
            Err(CoreError::Validation(ValidationError::Inconsistent { .. }))
        ));
    }
}
