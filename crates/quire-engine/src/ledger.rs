//! # Stock Ledger
//!
//! The only way on-hand quantities change.
//!
//! ## Adjustment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     adjust_once(t, e, delta, key)                       │
//! │                                                                         │
//! │  1. key already journaled?  ── yes ──► return current record           │
//! │        │ no                           (same edition + delta required)  │
//! │        ▼                                                                │
//! │  2. read record (version v)  ── none ─► NotFound                       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  3. StockLevel::apply(delta) ── below reserved ─► InsufficientStock    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  4. UPDATE ... WHERE version = v  + journal row (one transaction)      │
//! │        ├── 0 rows  ───────────► Conflict (no retry here)              │
//! │        ├── key taken ─────────► a concurrent twin won; return record   │
//! │        └── ok ────────────────► record at version v+1                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use quire_core::validation::{validate_required, validate_stock_intake};
use quire_core::{CoreError, Money, StockIntake, StockMovement, StockRecord, ValidationError};
use quire_db::{DbError, StockWrite};

use crate::error::{EngineError, EngineResult};
use crate::saga::UndoFuture;
use crate::store::{CatalogStore, StockStore};

#[derive(Clone)]
pub struct StockLedger {
    stock: Arc<dyn StockStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl StockLedger {
    pub fn new(stock: Arc<dyn StockStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        StockLedger { stock, catalog }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, tenant_id: &str, edition_id: &str) -> EngineResult<StockRecord> {
        self.stock
            .find_stock(tenant_id, edition_id)
            .await?
            .ok_or_else(|| EngineError::not_found("StockRecord", record_id(tenant_id, edition_id)))
    }

    pub async fn available_quantity(&self, tenant_id: &str, edition_id: &str) -> EngineResult<i64> {
        Ok(self.get(tenant_id, edition_id).await?.available_quantity())
    }

    pub async fn sale_price(&self, tenant_id: &str, edition_id: &str) -> EngineResult<Money> {
        Ok(self.get(tenant_id, edition_id).await?.sale_price())
    }

    /// Records whose available quantity is at or below their reorder level.
    pub async fn low_stock(&self, tenant_id: &str) -> EngineResult<Vec<StockRecord>> {
        let records = self.stock.list_stock(tenant_id).await?;
        Ok(records.into_iter().filter(|r| r.is_low_stock()).collect())
    }

    /// Applied movements for one record, oldest first.
    pub async fn movements(&self, tenant_id: &str, edition_id: &str) -> EngineResult<Vec<StockMovement>> {
        Ok(self.stock.movements(tenant_id, edition_id).await?)
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    /// Applies `on_hand += delta` under a fresh movement key.
    pub async fn adjust(&self, tenant_id: &str, edition_id: &str, delta: i64) -> EngineResult<StockRecord> {
        let key = format!("adjust:{}", Uuid::new_v4());
        self.adjust_once(tenant_id, edition_id, delta, &key).await
    }

    /// Applies `on_hand += delta` at most once per `movement_key`.
    ///
    /// ## Errors
    /// - `NotFound` if the pair has no stock record
    /// - `InsufficientStock` if the debit would leave on-hand below reserved
    /// - `Conflict` if the row changed between read and write
    /// - `Validation` if the key was already used for a different adjustment
    pub async fn adjust_once(
        &self,
        tenant_id: &str,
        edition_id: &str,
        delta: i64,
        movement_key: &str,
    ) -> EngineResult<StockRecord> {
        validate_required("tenant_id", tenant_id)?;
        validate_required("edition_id", edition_id)?;
        validate_required("movement_key", movement_key)?;

        if let Some(applied) = self.stock.movement_by_key(tenant_id, movement_key).await? {
            ensure_same_movement(&applied, edition_id, delta)?;
            debug!(tenant_id, edition_id, movement_key, "Movement already applied");
            return self.get(tenant_id, edition_id).await;
        }

        let record = self.get(tenant_id, edition_id).await?;
        let next = record
            .level()
            .apply(delta)
            .map_err(|e| stock_error(e, edition_id))?;

        let write = StockWrite {
            tenant_id,
            edition_id,
            expected_version: record.version,
            new_on_hand: next.on_hand,
            delta,
            movement_key,
        };

        match self.stock.compare_and_set(&write).await {
            Ok(updated) => Ok(updated),
            Err(e) if e.is_unique_violation_on("stock_movements") => {
                // a concurrent call with the same key committed first
                debug!(tenant_id, edition_id, movement_key, "Movement applied concurrently");
                let applied = self
                    .stock
                    .movement_by_key(tenant_id, movement_key)
                    .await?
                    .ok_or_else(|| EngineError::from(e))?;
                ensure_same_movement(&applied, edition_id, delta)?;
                self.get(tenant_id, edition_id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adds `intake.quantity` to an existing record, or creates the record
    /// with the intake's pricing.
    ///
    /// Repeated imports of the same (tenant, edition) merge into one record;
    /// pricing of an existing record is left alone.
    pub async fn create_or_top_up(
        &self,
        tenant_id: &str,
        edition_id: &str,
        intake: &StockIntake,
    ) -> EngineResult<StockRecord> {
        let key = format!("intake:{}", Uuid::new_v4());
        self.create_or_top_up_once(tenant_id, edition_id, intake, &key).await
    }

    /// [`create_or_top_up`](Self::create_or_top_up) at most once per key.
    pub async fn create_or_top_up_once(
        &self,
        tenant_id: &str,
        edition_id: &str,
        intake: &StockIntake,
        movement_key: &str,
    ) -> EngineResult<StockRecord> {
        validate_required("tenant_id", tenant_id)?;
        validate_required("edition_id", edition_id)?;
        validate_required("movement_key", movement_key)?;
        validate_stock_intake(intake)?;

        if let Some(applied) = self.stock.movement_by_key(tenant_id, movement_key).await? {
            ensure_same_movement(&applied, edition_id, intake.quantity)?;
            return self.get(tenant_id, edition_id).await;
        }

        if !self.catalog.edition_exists(edition_id).await? {
            return Err(EngineError::not_found("Edition", edition_id));
        }

        if self.stock.find_stock(tenant_id, edition_id).await?.is_some() {
            return self.top_up(tenant_id, edition_id, intake.quantity, movement_key).await;
        }

        let record = new_record(tenant_id, edition_id, intake);
        match self.stock.insert_stock(&record, movement_key).await {
            Ok(()) => {
                info!(
                    tenant_id,
                    edition_id,
                    on_hand = record.quantity_on_hand,
                    "Stock record created"
                );
                Ok(record)
            }
            // another intake created the row first; merge into it
            Err(e) if e.is_unique_violation_on("stock_records") => {
                self.top_up(tenant_id, edition_id, intake.quantity, movement_key).await
            }
            Err(DbError::ForeignKeyViolation { .. }) => Err(EngineError::not_found("Tenant", tenant_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// An undo step applying `delta` under `movement_key`, for
    /// [`Compensations`](crate::saga::Compensations).
    pub(crate) fn undo_step(
        &self,
        tenant_id: &str,
        edition_id: &str,
        delta: i64,
        movement_key: String,
    ) -> impl Fn() -> UndoFuture + Send + Sync + 'static {
        let ledger = self.clone();
        let tenant_id = tenant_id.to_string();
        let edition_id = edition_id.to_string();
        move || -> UndoFuture {
            let ledger = ledger.clone();
            let tenant_id = tenant_id.clone();
            let edition_id = edition_id.clone();
            let key = movement_key.clone();
            Box::pin(async move {
                ledger
                    .adjust_once(&tenant_id, &edition_id, delta, &key)
                    .await
                    .map(|_| ())
            })
        }
    }

    async fn top_up(
        &self,
        tenant_id: &str,
        edition_id: &str,
        quantity: i64,
        movement_key: &str,
    ) -> EngineResult<StockRecord> {
        if quantity == 0 {
            return self.get(tenant_id, edition_id).await;
        }
        let record = self.adjust_once(tenant_id, edition_id, quantity, movement_key).await?;
        info!(
            tenant_id,
            edition_id,
            quantity,
            on_hand = record.quantity_on_hand,
            "Stock topped up"
        );
        Ok(record)
    }
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger").finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn record_id(tenant_id: &str, edition_id: &str) -> String {
    format!("{}/{}", tenant_id, edition_id)
}

fn new_record(tenant_id: &str, edition_id: &str, intake: &StockIntake) -> StockRecord {
    let now = Utc::now();
    StockRecord {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        edition_id: edition_id.to_string(),
        quantity_on_hand: intake.quantity,
        quantity_reserved: intake.quantity_reserved,
        reorder_level: intake.reorder_level,
        cost_price_cents: intake.cost_price.cents(),
        profit_bps: intake.profit.bps(),
        discount_bps: intake.discount.bps(),
        location: intake.location.clone(),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

fn stock_error(err: CoreError, edition_id: &str) -> EngineError {
    match err {
        CoreError::InsufficientStock { available, requested } => EngineError::InsufficientStock {
            edition_id: edition_id.to_string(),
            available,
            requested,
            line: None,
        },
        other => other.into(),
    }
}

/// A reused key must describe the same adjustment.
fn ensure_same_movement(applied: &StockMovement, edition_id: &str, delta: i64) -> EngineResult<()> {
    if applied.edition_id == edition_id && applied.delta == delta {
        return Ok(());
    }
    Err(ValidationError::Inconsistent {
        field: "movement_key".to_string(),
        reason: format!(
            "'{}' was already used for {} on edition {}",
            applied.movement_key, applied.delta, applied.edition_id
        ),
    }
    .into())
}

// =============================================================================
// Unit Tests
// =============================================================================
