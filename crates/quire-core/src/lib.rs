//! # quire-core: Pure Business Logic for Quire
//!
//! This crate holds the rules of the bookshop stock ledger as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Quire Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           HTTP layer / auth / permissions (external)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ tenant_id resolved by caller           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    quire-engine                                 │   │
//! │  │    SaleProcessor, PurchaseOrderProcessor, TenantProvisioner     │   │
//! │  │                    StockLedger                                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ quire-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   stock   │  │purchasing │  │   │
//! │  │   │StockRecord│  │   Money   │  │StockLevel │  │OrderNumber│  │   │
//! │  │   │   Sale    │  │   Rate    │  │ Pricing   │  │ PO status │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    quire-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Tenant, StockRecord, Sale, PurchaseOrder, ...)
//! - [`money`] - Money and basis-point rates with integer arithmetic
//! - [`stock`] - Stock level arithmetic and sale price derivation
//! - [`sale`] - Sale line pricing and totals
//! - [`purchasing`] - Order numbers, delivery dates, PO status machine
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use quire_core::money::{Money, Rate};
//! use quire_core::stock::sale_price;
//!
//! // Cost $10.00, 25% profit, 10% discount
//! let price = sale_price(Money::from_cents(1000), Rate::from_bps(2500), Rate::from_bps(1000));
//! assert_eq!(price.cents(), 1125);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod purchasing;
pub mod sale;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale or purchase order.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity on a single sale or purchase-order line.
///
/// Guards against typing 1000 instead of 10 at the till.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Days added to the order date when no expected delivery date is supplied.
pub const DEFAULT_DELIVERY_LEAD_DAYS: i64 = 5;
