//! # Domain Types
//!
//! Core domain types used throughout Quire.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Tenant ──┬── User (role: admin | manager | cashier)                   │
//! │           ├── StockRecord (tenant, edition) ──► StockMovement journal  │
//! │           ├── Sale ──► SaleItem 1..N                                   │
//! │           └── PurchaseOrder ──► PurchaseOrderItem 1..N                 │
//! │                                                                         │
//! │  Book ──► Edition   (shared catalog; tenants bind via StockRecord)     │
//! │                                                                         │
//! │  Deleting a Tenant cascades to everything it owns.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity has a UUID v4 `id`. Tenant-owned entities carry `tenant_id`
//! explicitly; nothing in Quire resolves a tenant implicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, Rate};
use crate::stock::{self, StockLevel};

// =============================================================================
// Tenant
// =============================================================================

/// An isolated shop account; root of data partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    pub id: String,
    /// Display name, unique across tenants (case-insensitive).
    pub name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTenant {
    pub name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// User
// =============================================================================

/// Role granted to a user within their tenant.
///
/// Permission enforcement lives outside the engine; the role is stored so the
/// permission layer can read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff account belonging to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    /// Login email, unique across all tenants.
    pub email: String,
    pub full_name: String,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user. Credentials are handled by the auth service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// A logical book (title/author/category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sellable edition of a book, bound to an ISBN and format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Edition {
    pub id: String,
    pub book_id: String,
    pub isbn: String,
    /// Hardcover, paperback, ebook, ...
    pub format: String,
    pub publisher: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock
// =============================================================================

/// The per-tenant, per-edition quantity and pricing row.
///
/// ## Invariant
/// `quantity_on_hand >= quantity_reserved >= 0` at all times. Only the
/// stock ledger writes `quantity_on_hand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockRecord {
    pub id: String,
    pub tenant_id: String,
    pub edition_id: String,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub reorder_level: i64,
    /// Cost price in cents.
    pub cost_price_cents: i64,
    /// Profit margin in basis points (2500 = 25%).
    pub profit_bps: u32,
    /// Discount in basis points, 0..=10000.
    pub discount_bps: u32,
    /// Shelf or warehouse section.
    pub location: Option<String>,
    /// Bumped on every write; guards compare-and-set updates.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// The quantity pair the ledger arithmetic works on.
    #[inline]
    pub fn level(&self) -> StockLevel {
        StockLevel {
            on_hand: self.quantity_on_hand,
            reserved: self.quantity_reserved,
        }
    }

    /// `on_hand - reserved`.
    #[inline]
    pub fn available_quantity(&self) -> i64 {
        self.level().available()
    }

    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn profit(&self) -> Rate {
        Rate::from_bps(self.profit_bps)
    }

    #[inline]
    pub fn discount(&self) -> Rate {
        Rate::from_bps(self.discount_bps)
    }

    /// `cost × (1 + profit) × (1 − discount)`, rounded to cents.
    pub fn sale_price(&self) -> Money {
        stock::sale_price(self.cost_price(), self.profit(), self.discount())
    }

    /// True when available stock has fallen to the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.available_quantity() <= self.reorder_level
    }
}

/// Initial quantity and pricing inputs for a new stock record.
///
/// When the record already exists only `quantity` is used (a restock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockIntake {
    pub quantity: i64,
    pub quantity_reserved: i64,
    pub reorder_level: i64,
    pub cost_price: Money,
    pub profit: Rate,
    pub discount: Rate,
    pub location: Option<String>,
}

impl StockIntake {
    /// Reorder level used when the intake does not specify one.
    pub const DEFAULT_REORDER_LEVEL: i64 = 5;

    /// An intake with the given quantity and cost and no margin or discount.
    pub fn new(quantity: i64, cost_price: Money) -> Self {
        StockIntake {
            quantity,
            quantity_reserved: 0,
            reorder_level: Self::DEFAULT_REORDER_LEVEL,
            cost_price,
            profit: Rate::zero(),
            discount: Rate::zero(),
            location: None,
        }
    }

    pub fn with_profit(mut self, profit: Rate) -> Self {
        self.profit = profit;
        self
    }

    pub fn with_discount(mut self, discount: Rate) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_reserved(mut self, reserved: i64) -> Self {
        self.quantity_reserved = reserved;
        self
    }

    pub fn with_reorder_level(mut self, level: i64) -> Self {
        self.reorder_level = level;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// One applied ledger adjustment. Read-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub edition_id: String,
    /// Idempotency key; unique per tenant.
    pub movement_key: String,
    pub delta: i64,
    pub on_hand_after: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Recorded, awaiting payment confirmation.
    Pending,
    /// Paid in full.
    Paid,
    /// Cancelled; sold quantities were returned to stock.
    Cancelled,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Paid => "paid",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    MobileMoney,
    BankTransfer,
}

/// A sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub amount_received_cents: Option<i64>,
    pub change_given_cents: Option<i64>,
    /// Sum of line totals, computed server-side.
    pub total_amount_cents: i64,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// A line item in a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Position in the submitted order, starting at 0.
    pub line_no: i64,
    pub edition_id: String,
    pub quantity_sold: i64,
    pub unit_price_cents: i64,
    pub tax_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    /// unit_price × quantity − discount + tax.
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A sale header together with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Purchase Order
// =============================================================================

/// Purchase order lifecycle.
///
/// ```text
/// pending ──► approved ──► partial ──► received
///    │            │           │
///    └────────────┴───────────┴──► cancelled
/// ```
/// `received`, `cancelled` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Approved,
    Received,
    Partial,
    Completed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Partial => "partial",
            PurchaseOrderStatus::Completed => "completed",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for PurchaseOrderStatus {
    fn default() -> Self {
        PurchaseOrderStatus::Pending
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replenishment order to a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub tenant_id: String,
    pub supplier_id: String,
    /// Numeric part of `order_number`; orders sort by this, not the string.
    pub order_seq: i64,
    /// `A0001`, `A0002`, ...
    pub order_number: String,
    pub status: PurchaseOrderStatus,
    /// Σ unit_cost × quantity_ordered, computed server-side.
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub expected_delivery_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub po_id: String,
    pub line_no: i64,
    pub edition_id: String,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    pub unit_cost_cents: i64,
}

impl PurchaseOrderItem {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Quantity still expected from the supplier.
    #[inline]
    pub fn outstanding(&self) -> i64 {
        self.quantity_ordered - self.quantity_received
    }
}

/// A purchase order header together with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================
