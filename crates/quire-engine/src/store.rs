//! # Record Store
//!
//! The persistence seams the engine talks through.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  StockLedger ──────────► StockStore + CatalogStore                     │
//! │  SaleProcessor ────────► SaleStore        (+ ledger)                   │
//! │  PurchaseOrderProcessor► PurchaseOrderStore + CatalogStore (+ ledger)  │
//! │  TenantProvisioner ────► TenantStore + UserStore                       │
//! │                                                                         │
//! │            all implemented by quire_db::Database                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Components hold `Arc<dyn XxxStore>` so a single store can be swapped
//! (tests inject failing ones) without touching the others.

use async_trait::async_trait;

use quire_core::{
    PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Sale, SaleItem, SaleStatus, StockMovement,
    StockRecord, Tenant, User,
};
use quire_db::{Database, DbResult, StockWrite};

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert_tenant(&self, tenant: &Tenant) -> DbResult<()>;
    async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>>;
    /// Case-insensitive lookup.
    async fn find_tenant_by_name(&self, name: &str) -> DbResult<Option<Tenant>>;
    /// Deletes the tenant and, by cascade, everything it owns.
    async fn delete_tenant(&self, id: &str) -> DbResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> DbResult<()>;
    async fn get_user(&self, id: &str) -> DbResult<Option<User>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn edition_exists(&self, edition_id: &str) -> DbResult<bool>;
}

/// Stock rows and their movement journal.
///
/// Writes are atomic with their journal entry: a movement key that is
/// already taken fails the whole write.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn find_stock(&self, tenant_id: &str, edition_id: &str) -> DbResult<Option<StockRecord>>;
    async fn insert_stock(&self, record: &StockRecord, movement_key: &str) -> DbResult<()>;
    async fn compare_and_set(&self, write: &StockWrite<'_>) -> DbResult<StockRecord>;
    async fn movement_by_key(&self, tenant_id: &str, movement_key: &str) -> DbResult<Option<StockMovement>>;
    async fn movements(&self, tenant_id: &str, edition_id: &str) -> DbResult<Vec<StockMovement>>;
    async fn list_stock(&self, tenant_id: &str) -> DbResult<Vec<StockRecord>>;
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Header and items in one unit; never one without the other.
    async fn insert_sale(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<()>;
    async fn get_sale(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>>;
    async fn get_sale_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>>;
    async fn update_sale_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait PurchaseOrderStore: Send + Sync {
    /// Next value of the tenant's order counter. Never hands out a value twice.
    async fn next_order_seq(&self, tenant_id: &str) -> DbResult<i64>;
    async fn insert_order(&self, order: &PurchaseOrder) -> DbResult<()>;
    async fn insert_order_item(&self, item: &PurchaseOrderItem) -> DbResult<()>;
    async fn delete_order_item(&self, item_id: &str) -> DbResult<bool>;
    async fn delete_order(&self, tenant_id: &str, id: &str) -> DbResult<bool>;
    async fn get_order(&self, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>>;
    async fn get_order_items(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>>;
    async fn update_order_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    ) -> DbResult<bool>;
    async fn record_received(&self, item_id: &str, expected: i64, received: i64) -> DbResult<bool>;
}

// =============================================================================
// SQLite Implementation
// =============================================================================

#[async_trait]
impl TenantStore for Database {
    async fn insert_tenant(&self, tenant: &Tenant) -> DbResult<()> {
        self.tenants().insert(tenant).await
    }

    async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>> {
        self.tenants().get_by_id(id).await
    }

    async fn find_tenant_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
        self.tenants().find_by_name(name).await
    }

    async fn delete_tenant(&self, id: &str) -> DbResult<bool> {
        self.tenants().delete(id).await
    }
}

#[async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &User) -> DbResult<()> {
        self.users().insert(user).await
    }

    async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        self.users().get_by_id(id).await
    }
}

#[async_trait]
impl CatalogStore for Database {
    async fn edition_exists(&self, edition_id: &str) -> DbResult<bool> {
        self.catalog().edition_exists(edition_id).await
    }
}

#[async_trait]
impl StockStore for Database {
    async fn find_stock(&self, tenant_id: &str, edition_id: &str) -> DbResult<Option<StockRecord>> {
        self.stock().find(tenant_id, edition_id).await
    }

    async fn insert_stock(&self, record: &StockRecord, movement_key: &str) -> DbResult<()> {
        self.stock().insert(record, movement_key).await
    }

    async fn compare_and_set(&self, write: &StockWrite<'_>) -> DbResult<StockRecord> {
        self.stock().compare_and_set(write).await
    }

    async fn movement_by_key(&self, tenant_id: &str, movement_key: &str) -> DbResult<Option<StockMovement>> {
        self.stock().movement_by_key(tenant_id, movement_key).await
    }

    async fn movements(&self, tenant_id: &str, edition_id: &str) -> DbResult<Vec<StockMovement>> {
        self.stock().movements(tenant_id, edition_id).await
    }

    async fn list_stock(&self, tenant_id: &str) -> DbResult<Vec<StockRecord>> {
        self.stock().list_for_tenant(tenant_id).await
    }
}

#[async_trait]
impl SaleStore for Database {
    async fn insert_sale(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<()> {
        self.sales().insert(sale, items).await
    }

    async fn get_sale(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        self.sales().get_by_id(tenant_id, id).await
    }

    async fn get_sale_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        self.sales().get_items(sale_id).await
    }

    async fn update_sale_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool> {
        self.sales().update_status(tenant_id, id, from, to).await
    }
}

#[async_trait]
impl PurchaseOrderStore for Database {
    async fn next_order_seq(&self, tenant_id: &str) -> DbResult<i64> {
        self.purchase_orders().next_order_seq(tenant_id).await
    }

    async fn insert_order(&self, order: &PurchaseOrder) -> DbResult<()> {
        self.purchase_orders().insert_header(order).await
    }

    async fn insert_order_item(&self, item: &PurchaseOrderItem) -> DbResult<()> {
        self.purchase_orders().insert_item(item).await
    }

    async fn delete_order_item(&self, item_id: &str) -> DbResult<bool> {
        self.purchase_orders().delete_item(item_id).await
    }

    async fn delete_order(&self, tenant_id: &str, id: &str) -> DbResult<bool> {
        self.purchase_orders().delete_header(tenant_id, id).await
    }

    async fn get_order(&self, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        self.purchase_orders().get_by_id(tenant_id, id).await
    }

    async fn get_order_items(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        self.purchase_orders().get_items(po_id).await
    }

    async fn update_order_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    ) -> DbResult<bool> {
        self.purchase_orders().update_status(tenant_id, id, from, to).await
    }

    async fn record_received(&self, item_id: &str, expected: i64, received: i64) -> DbResult<bool> {
        self.purchase_orders().record_received(item_id, expected, received).await
    }
}
