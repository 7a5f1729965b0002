//! # quire-engine: Stock Ledger and Transactional Processors
//!
//! Every change to stock, sales and purchase orders goes through this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller (HTTP layer, resolves tenant + permissions)                     │
//! │       │  tenant_id passed explicitly on every call                      │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   quire-engine (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  Engine                                                         │   │
//! │  │   ├── sales         SaleProcessor ─────────┐                    │   │
//! │  │   ├── purchasing    PurchaseOrderProcessor ┤                    │   │
//! │  │   ├── ledger        StockLedger ◄──────────┘                    │   │
//! │  │   └── provisioning  TenantProvisioner                           │   │
//! │  │                                                                 │   │
//! │  │  saga::Compensations   undo log shared by the processors        │   │
//! │  │  store::*Store         record store traits                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  quire-db (SQLite)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quire_engine::{Engine, EngineConfig};
//!
//! let (engine, db) = Engine::open(&EngineConfig::load(None)?).await?;
//! let record = engine.ledger.adjust(&tenant_id, &edition_id, 12).await?;
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod provisioning;
pub mod purchasing;
pub mod saga;
pub mod sale;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

use quire_db::Database;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use ledger::StockLedger;
pub use provisioning::{ProvisionedTenant, TenantProvisioner};
pub use purchasing::PurchaseOrderProcessor;
pub use sale::SaleProcessor;

// =============================================================================
// Engine
// =============================================================================

/// The engine components, wired to one database.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone, Debug)]
pub struct Engine {
    pub ledger: StockLedger,
    pub sales: SaleProcessor,
    pub purchasing: PurchaseOrderProcessor,
    pub provisioning: TenantProvisioner,
}

impl Engine {
    pub fn new(db: &Database, config: &EngineConfig) -> Self {
        let store = Arc::new(db.clone());
        let ledger = StockLedger::new(store.clone(), store.clone());

        Engine {
            sales: SaleProcessor::new(ledger.clone(), store.clone(), &config.ledger),
            purchasing: PurchaseOrderProcessor::new(
                ledger.clone(),
                store.clone(),
                store.clone(),
                &config.purchasing,
                &config.ledger,
            ),
            provisioning: TenantProvisioner::new(store.clone(), store, &config.ledger),
            ledger,
        }
    }

    /// Validates the config, opens the database (running migrations) and
    /// builds the engine on top of it.
    pub async fn open(config: &EngineConfig) -> EngineResult<(Engine, Database)> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        info!(path = %config.database.path.display(), "Engine ready");
        Ok((Engine::new(&db, config), db))
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use quire_core::{
        Money, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, Rate, Sale, SaleItem, SaleStatus,
        StockIntake, StockMovement, StockRecord, Tenant, User,
    };
    use quire_db::{Database, DbConfig, DbError, DbResult, StockWrite};

    use crate::store::{PurchaseOrderStore, SaleStore, StockStore, TenantStore, UserStore};
    use crate::{Engine, EngineConfig};

    pub async fn engine() -> (Database, Engine) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = Engine::new(&db, &EngineConfig::in_memory());
        (db, engine)
    }

    /// An engine on `db` with some components swapped out.
    pub fn engine_with(db: &Database, swap: impl FnOnce(&mut Engine)) -> Engine {
        let mut engine = Engine::new(db, &EngineConfig::in_memory());
        swap(&mut engine);
        engine
    }

    pub async fn tenant(db: &Database) -> String {
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4().to_string(),
            name: format!("Shop {}", Uuid::new_v4().simple()),
            contact_email: "owner@example.com".to_string(),
            contact_phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        };
        db.tenants().insert(&tenant).await.unwrap();
        tenant.id
    }

    pub async fn edition(db: &Database) -> String {
        db.catalog()
            .create_edition("Dune", "Frank Herbert", &format!("978-{}", Uuid::new_v4().simple()), "paperback")
            .await
            .unwrap()
            .id
    }

    pub async fn tenant_with_edition(db: &Database) -> (String, String) {
        (tenant(db).await, edition(db).await)
    }

    /// A tenant holding `quantity` of a fresh edition: cost 10.00, profit
    /// 25%, discount 10%, so a sale price of 11.25.
    pub async fn stocked(db: &Database, engine: &Engine, quantity: i64) -> (String, String) {
        let (t, e) = tenant_with_edition(db).await;
        let intake = StockIntake::new(quantity, Money::from_cents(1000))
            .with_profit(Rate::from_bps(2500))
            .with_discount(Rate::from_bps(1000));
        engine.ledger.create_or_top_up(&t, &e, &intake).await.unwrap();
        (t, e)
    }

    // -------------------------------------------------------------------------
    // Faulty stores
    // -------------------------------------------------------------------------

    /// Sales whose header write always fails.
    pub struct FailingSales(pub Database);

    #[async_trait]
    impl SaleStore for FailingSales {
        async fn insert_sale(&self, _sale: &Sale, _items: &[SaleItem]) -> DbResult<()> {
            Err(DbError::QueryFailed("disk I/O error".to_string()))
        }

        async fn get_sale(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
            self.0.get_sale(tenant_id, id).await
        }

        async fn get_sale_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
            self.0.get_sale_items(sale_id).await
        }

        async fn update_sale_status(
            &self,
            tenant_id: &str,
            id: &str,
            from: SaleStatus,
            to: SaleStatus,
        ) -> DbResult<bool> {
            self.0.update_sale_status(tenant_id, id, from, to).await
        }
    }

    /// Stock that can be debited but never credited.
    pub struct NoCredits(pub Database);

    #[async_trait]
    impl StockStore for NoCredits {
        async fn find_stock(&self, tenant_id: &str, edition_id: &str) -> DbResult<Option<StockRecord>> {
            self.0.find_stock(tenant_id, edition_id).await
        }

        async fn insert_stock(&self, record: &StockRecord, movement_key: &str) -> DbResult<()> {
            self.0.insert_stock(record, movement_key).await
        }

        async fn compare_and_set(&self, write: &StockWrite<'_>) -> DbResult<StockRecord> {
            if write.delta > 0 {
                return Err(DbError::ConnectionFailed("connection reset".to_string()));
            }
            self.0.compare_and_set(write).await
        }

        async fn movement_by_key(&self, tenant_id: &str, movement_key: &str) -> DbResult<Option<StockMovement>> {
            self.0.movement_by_key(tenant_id, movement_key).await
        }

        async fn movements(&self, tenant_id: &str, edition_id: &str) -> DbResult<Vec<StockMovement>> {
            self.0.movements(tenant_id, edition_id).await
        }

        async fn list_stock(&self, tenant_id: &str) -> DbResult<Vec<StockRecord>> {
            self.0.list_stock(tenant_id).await
        }
    }

    /// Purchase order storage with switchable faults.
    pub struct FaultyOrders {
        db: Database,
        fail_item_insert: Option<usize>,
        item_inserts: AtomicUsize,
        stale_seq: AtomicU32,
        reject_receipt: Option<usize>,
        receipts: AtomicUsize,
    }

    impl FaultyOrders {
        pub fn new(db: Database) -> Self {
            FaultyOrders {
                db,
                fail_item_insert: None,
                item_inserts: AtomicUsize::new(0),
                stale_seq: AtomicU32::new(0),
                reject_receipt: None,
                receipts: AtomicUsize::new(0),
            }
        }

        pub fn db(&self) -> &Database {
            &self.db
        }

        /// Fails the n-th item insert (0-based).
        pub fn fail_item_insert(mut self, nth: usize) -> Self {
            self.fail_item_insert = Some(nth);
            self
        }

        /// Hands out sequence 1 for the next `times` calls.
        pub fn stale_seq(self, times: u32) -> Self {
            self.stale_seq.store(times, Ordering::SeqCst);
            self
        }

        /// Reports the n-th received-quantity update (0-based) as lost.
        pub fn reject_receipt(mut self, nth: usize) -> Self {
            self.reject_receipt = Some(nth);
            self
        }
    }

    #[async_trait]
    impl PurchaseOrderStore for FaultyOrders {
        async fn next_order_seq(&self, tenant_id: &str) -> DbResult<i64> {
            let stale = self
                .stale_seq
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(1);
            }
            self.db.next_order_seq(tenant_id).await
        }

        async fn insert_order(&self, order: &PurchaseOrder) -> DbResult<()> {
            self.db.insert_order(order).await
        }

        async fn insert_order_item(&self, item: &PurchaseOrderItem) -> DbResult<()> {
            let n = self.item_inserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_item_insert == Some(n) {
                return Err(DbError::QueryFailed("disk I/O error".to_string()));
            }
            self.db.insert_order_item(item).await
        }

        async fn delete_order_item(&self, item_id: &str) -> DbResult<bool> {
            self.db.delete_order_item(item_id).await
        }

        async fn delete_order(&self, tenant_id: &str, id: &str) -> DbResult<bool> {
            self.db.delete_order(tenant_id, id).await
        }

        async fn get_order(&self, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
            self.db.get_order(tenant_id, id).await
        }

        async fn get_order_items(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
            self.db.get_order_items(po_id).await
        }

        async fn update_order_status(
            &self,
            tenant_id: &str,
            id: &str,
            from: PurchaseOrderStatus,
            to: PurchaseOrderStatus,
        ) -> DbResult<bool> {
            self.db.update_order_status(tenant_id, id, from, to).await
        }

        async fn record_received(&self, item_id: &str, expected: i64, received: i64) -> DbResult<bool> {
            let n = self.receipts.fetch_add(1, Ordering::SeqCst);
            if self.reject_receipt == Some(n) {
                return Ok(false);
            }
            self.db.record_received(item_id, expected, received).await
        }
    }

    /// Users that can never be created.
    pub struct FailingUsers;

    #[async_trait]
    impl UserStore for FailingUsers {
        async fn insert_user(&self, _user: &User) -> DbResult<()> {
            Err(DbError::QueryFailed("disk I/O error".to_string()))
        }

        async fn get_user(&self, _id: &str) -> DbResult<Option<User>> {
            Ok(None)
        }
    }

    /// Tenants that can be created but not deleted.
    pub struct StuckTenants(pub Database);

    #[async_trait]
    impl TenantStore for StuckTenants {
        async fn insert_tenant(&self, tenant: &Tenant) -> DbResult<()> {
            self.0.insert_tenant(tenant).await
        }

        async fn get_tenant(&self, id: &str) -> DbResult<Option<Tenant>> {
            self.0.get_tenant(id).await
        }

        async fn find_tenant_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
            self.0.find_tenant_by_name(name).await
        }

        async fn delete_tenant(&self, _id: &str) -> DbResult<bool> {
            Err(DbError::PoolExhausted)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
