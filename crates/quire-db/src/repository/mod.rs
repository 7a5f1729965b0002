//! # Repository Module
//!
//! Database repository implementations for Quire.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quire-engine                                                          │
//! │       │                                                                 │
//! │       │  db.stock().compare_and_set(...)                               │
//! │       ▼                                                                 │
//! │  StockRepository                                                       │
//! │  ├── find(&self, tenant_id, edition_id)                                │
//! │  ├── insert(&self, record)                                             │
//! │  ├── compare_and_set(&self, write)   ← version guard + journal row    │
//! │  └── movement_by_key(&self, tenant_id, key)                            │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tenant-scoped query takes `tenant_id` and filters on it; a row of
//! another tenant is reported as not found.
//!
//! ## Available Repositories
//!
//! - [`tenant::TenantRepository`] - Tenants
//! - [`user::UserRepository`] - Staff accounts
//! - [`catalog::CatalogRepository`] - Books and editions
//! - [`stock::StockRepository`] - Stock records and the movement journal
//! - [`sale::SaleRepository`] - Sales and sale items
//! - [`purchase_order::PurchaseOrderRepository`] - Orders, items, numbering

pub mod catalog;
pub mod purchase_order;
pub mod sale;
pub mod stock;
pub mod tenant;
pub mod user;
