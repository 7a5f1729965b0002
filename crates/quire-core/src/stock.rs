//! # Stock Arithmetic
//!
//! The debit/credit rules the stock ledger applies to a record, and the sale
//! price derivation. Pure functions: the ledger reads a row, asks this module
//! for the next level, then writes it back with a compare-and-set.
//!
//! ## Adjustment Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  on_hand += delta                                                       │
//! │                                                                         │
//! │  delta >= 0  → always accepted (restock, compensation credit)          │
//! │  delta <  0  → accepted only if on_hand + delta >= reserved            │
//! │                                                                         │
//! │  on_hand=10 reserved=2:   -8 ✓ (on_hand=2)   -9 ✗ InsufficientStock    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{round_half_up, Money, Rate, BPS_SCALE};

/// On-hand and reserved quantities of one stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub on_hand: i64,
    pub reserved: i64,
}

impl StockLevel {
    pub const fn new(on_hand: i64, reserved: i64) -> Self {
        StockLevel { on_hand, reserved }
    }

    /// `on_hand - reserved`.
    #[inline]
    pub const fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }

    /// True when `on_hand >= reserved >= 0`.
    #[inline]
    pub const fn is_consistent(&self) -> bool {
        self.reserved >= 0 && self.on_hand >= self.reserved
    }

    /// Returns the level after applying `delta` to on-hand.
    ///
    /// ## Errors
    /// - `InsufficientStock` when a debit would leave less on hand than is reserved
    /// - `Overflow` when the sum leaves the i64 range
    pub fn apply(&self, delta: i64) -> CoreResult<StockLevel> {
        let on_hand = self
            .on_hand
            .checked_add(delta)
            .ok_or(CoreError::Overflow("quantity_on_hand"))?;

        if delta < 0 && on_hand < self.reserved {
            return Err(CoreError::InsufficientStock {
                available: self.available(),
                requested: delta.saturating_neg(),
            });
        }

        Ok(StockLevel {
            on_hand,
            reserved: self.reserved,
        })
    }
}

/// Derives the selling price: `cost × (1 + profit) × (1 − discount)`.
///
/// Computed in i128 over basis points and rounded half-up to cents once, at
/// the end. A discount above 100% is clamped to 100%.
///
/// ```rust
/// use quire_core::money::{Money, Rate};
/// use quire_core::stock::sale_price;
///
/// // 19.99 at 30% margin, no discount = 25.987 → 25.99
/// let price = sale_price(Money::from_cents(1999), Rate::from_bps(3000), Rate::zero());
/// assert_eq!(price.cents(), 2599);
/// ```
pub fn sale_price(cost: Money, profit: Rate, discount: Rate) -> Money {
    let scale = BPS_SCALE as i128;
    let markup = scale + profit.bps() as i128;
    let keep = scale - (discount.bps().min(BPS_SCALE) as i128);
    let numerator = cost.cents() as i128 * markup * keep;
    Money::from_cents(round_half_up(numerator, scale * scale) as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================
