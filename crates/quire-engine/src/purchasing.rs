//! # Purchase Order Processor
//!
//! Replenishment orders: numbering, totals, status machine and receipts.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 create_purchase_order(t, request)                       │
//! │                                                                         │
//! │  1. VALIDATE: supplier, ≥1 item, qty > 0, unit cost > 0, dates,        │
//! │     every edition in the catalog                                       │
//! │  2. TOTAL = Σ unit_cost × quantity   (caller's figure ignored)         │
//! │  3. NUMBER                                                              │
//! │     seq = next_order_seq(t)          atomic, never reused              │
//! │     insert header "A{seq:04}"                                          │
//! │        └── number taken ─► next seq, up to N attempts                  │
//! │  4. ITEMS one by one, each recording its undo                          │
//! │        └── err ─► delete items + header, return err                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receipt Flow
//! ```text
//! approved/partial order + delivered quantities
//!      │
//!      ▼
//! plan_receipt ── over-receipt / unknown edition ─► Validation
//!      │
//!      ▼
//! per allocation: ledger.create_or_top_up_once (+qty)  ─┐ each step
//!                 record_received(item, before, after)  ─┘ records its undo
//!      │
//!      ▼
//! status → partial | received
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use quire_core::purchasing::{
    expected_delivery, order_total, plan_receipt, validate_purchase_order, NewPurchaseOrder,
    OrderNumber, ReceiptLine,
};
use quire_core::validation::validate_required;
use quire_core::{
    Money, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, PurchaseOrderStatus, StockIntake,
};
use quire_db::DbError;

use crate::config::{LedgerSettings, PurchasingSettings};
use crate::error::{EngineError, EngineResult};
use crate::ledger::StockLedger;
use crate::saga::Compensations;
use crate::store::{CatalogStore, PurchaseOrderStore};

#[derive(Clone)]
pub struct PurchaseOrderProcessor {
    ledger: StockLedger,
    orders: Arc<dyn PurchaseOrderStore>,
    catalog: Arc<dyn CatalogStore>,
    settings: PurchasingSettings,
    compensation_attempts: u32,
}

impl PurchaseOrderProcessor {
    pub fn new(
        ledger: StockLedger,
        orders: Arc<dyn PurchaseOrderStore>,
        catalog: Arc<dyn CatalogStore>,
        settings: &PurchasingSettings,
        ledger_settings: &LedgerSettings,
    ) -> Self {
        PurchaseOrderProcessor {
            ledger,
            orders,
            catalog,
            settings: settings.clone(),
            compensation_attempts: ledger_settings.compensation_attempts,
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order with its items and the tenant's next order number.
    ///
    /// ## Errors
    /// - `Validation` for a malformed request (nothing written, no number used)
    /// - `NotFound` for an unknown tenant, or an unknown edition (with line)
    /// - `DuplicateOrderNumber` when every attempted number was taken
    pub async fn create_purchase_order(
        &self,
        tenant_id: &str,
        request: &NewPurchaseOrder,
    ) -> EngineResult<PurchaseOrderDetail> {
        validate_required("tenant_id", tenant_id)?;
        validate_purchase_order(request)?;

        for (index, line) in request.items.iter().enumerate() {
            if !self.catalog.edition_exists(&line.edition_id).await? {
                return Err(EngineError::not_found("Edition", line.edition_id.as_str()).at_line(index));
            }
        }

        let total = order_total(&request.items)?;
        if let Some(declared) = request.declared_total {
            if declared != total {
                warn!(
                    tenant_id,
                    declared = declared.cents(),
                    computed = total.cents(),
                    "Ignoring caller-supplied order total"
                );
            }
        }

        let order_date = request.order_date.unwrap_or_else(Utc::now);
        let delivery = expected_delivery(
            order_date,
            request.expected_delivery_date,
            self.settings.delivery_lead_days,
        );

        let order = self
            .insert_numbered(tenant_id, &request.supplier_id, total, order_date, delivery)
            .await?;

        let mut undo = Compensations::new("create_purchase_order", self.compensation_attempts);
        undo.record(format!("delete order {}", order.order_number), {
            let orders = self.orders.clone();
            let tenant_id = tenant_id.to_string();
            let po_id = order.id.clone();
            move || {
                let orders = orders.clone();
                let tenant_id = tenant_id.clone();
                let po_id = po_id.clone();
                async move {
                    orders.delete_order(&tenant_id, &po_id).await?;
                    Ok(())
                }
            }
        });

        let mut items = Vec::with_capacity(request.items.len());
        for (index, line) in request.items.iter().enumerate() {
            let item = PurchaseOrderItem {
                id: Uuid::new_v4().to_string(),
                po_id: order.id.clone(),
                line_no: index as i64,
                edition_id: line.edition_id.clone(),
                quantity_ordered: line.quantity,
                quantity_received: 0,
                unit_cost_cents: line.unit_cost.cents(),
            };

            if let Err(e) = self.orders.insert_order_item(&item).await {
                warn!(
                    tenant_id,
                    order_number = %order.order_number,
                    line = index,
                    error = %e,
                    "Order item insert failed, removing order"
                );
                roll_back(undo, &order.order_number).await;
                return Err(EngineError::from(e).at_line(index));
            }

            undo.record(format!("delete item {}", index), {
                let orders = self.orders.clone();
                let item_id = item.id.clone();
                move || {
                    let orders = orders.clone();
                    let item_id = item_id.clone();
                    async move {
                        orders.delete_order_item(&item_id).await?;
                        Ok(())
                    }
                }
            });
            items.push(item);
        }
        undo.commit();

        info!(
            tenant_id,
            po_id = %order.id,
            order_number = %order.order_number,
            items = items.len(),
            total = order.total_amount_cents,
            "Purchase order created"
        );
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Inserts the header under the tenant's next free order number.
    async fn insert_numbered(
        &self,
        tenant_id: &str,
        supplier_id: &str,
        total: Money,
        order_date: DateTime<Utc>,
        delivery: DateTime<Utc>,
    ) -> EngineResult<PurchaseOrder> {
        let id = Uuid::new_v4().to_string();
        let mut last_tried = String::new();

        for attempt in 1..=self.settings.order_number_attempts {
            let seq = self
                .orders
                .next_order_seq(tenant_id)
                .await
                .map_err(|e| tenant_error(e, tenant_id))?;
            let number = OrderNumber::from_seq(seq)?;

            let now = Utc::now();
            let order = PurchaseOrder {
                id: id.clone(),
                tenant_id: tenant_id.to_string(),
                supplier_id: supplier_id.to_string(),
                order_seq: number.seq(),
                order_number: number.to_string(),
                status: PurchaseOrderStatus::Pending,
                total_amount_cents: total.cents(),
                order_date,
                expected_delivery_date: delivery,
                created_at: now,
                updated_at: now,
            };

            match self.orders.insert_order(&order).await {
                Ok(()) => return Ok(order),
                Err(e) if e.is_unique_violation_on("purchase_orders") => {
                    warn!(tenant_id, order_number = %number, attempt, "Order number taken, trying the next one");
                    last_tried = order.order_number;
                }
                Err(e) => return Err(tenant_error(e, tenant_id)),
            }
        }

        Err(EngineError::DuplicateOrderNumber {
            tenant_id: tenant_id.to_string(),
            order_number: last_tried,
        })
    }

    // =========================================================================
    // Reads & Status
    // =========================================================================

    pub async fn get_purchase_order(&self, tenant_id: &str, po_id: &str) -> EngineResult<PurchaseOrderDetail> {
        let order = self.load(tenant_id, po_id).await?;
        let items = self.orders.get_order_items(&order.id).await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Moves an order along its status machine.
    ///
    /// `received` set here is a status change only; stock is credited by
    /// [`receive_purchase_order`](Self::receive_purchase_order).
    pub async fn transition(
        &self,
        tenant_id: &str,
        po_id: &str,
        to: PurchaseOrderStatus,
    ) -> EngineResult<PurchaseOrder> {
        loop {
            let current = self.load(tenant_id, po_id).await?;
            current.status.transition(to)?;
            if self
                .orders
                .update_order_status(tenant_id, po_id, current.status, to)
                .await?
            {
                info!(tenant_id, po_id, from = %current.status, to = %to, "Purchase order status changed");
                return self.load(tenant_id, po_id).await;
            }
            debug!(tenant_id, po_id, "Order status moved concurrently, re-reading");
        }
    }

    pub async fn approve(&self, tenant_id: &str, po_id: &str) -> EngineResult<PurchaseOrder> {
        self.transition(tenant_id, po_id, PurchaseOrderStatus::Approved).await
    }

    pub async fn cancel(&self, tenant_id: &str, po_id: &str) -> EngineResult<PurchaseOrder> {
        self.transition(tenant_id, po_id, PurchaseOrderStatus::Cancelled).await
    }

    // =========================================================================
    // Receipts
    // =========================================================================

    /// Books a delivery: credits stock and records received quantities.
    ///
    /// New stock records take the item's unit cost as their cost price.
    ///
    /// ## Errors
    /// - `InvalidStatusTransition` unless the order is approved or partial
    /// - `Validation` for over-receipt or an edition not on the order
    /// - `Conflict` if another receipt for the same order ran concurrently;
    ///   credits already applied are reversed
    pub async fn receive_purchase_order(
        &self,
        tenant_id: &str,
        po_id: &str,
        receipts: &[ReceiptLine],
    ) -> EngineResult<PurchaseOrderDetail> {
        validate_required("tenant_id", tenant_id)?;
        let order = self.load(tenant_id, po_id).await?;
        let items = self.orders.get_order_items(&order.id).await?;
        let plan = plan_receipt(order.status, &items, receipts)?;

        let receipt_id = Uuid::new_v4();
        let mut undo = Compensations::new("receive_purchase_order", self.compensation_attempts);

        for (index, alloc) in plan.allocations.iter().enumerate() {
            let key = format!("po:{}:receipt:{}:{}", order.id, receipt_id, index);
            let intake = StockIntake::new(alloc.quantity, alloc.unit_cost);

            if let Err(e) = self
                .ledger
                .create_or_top_up_once(tenant_id, &alloc.edition_id, &intake, &key)
                .await
            {
                roll_back(undo, &order.order_number).await;
                return Err(e);
            }
            undo.record(
                format!("debit receipt line {}", index),
                self.ledger
                    .undo_step(tenant_id, &alloc.edition_id, -alloc.quantity, format!("{}:undo", key)),
            );

            let before = alloc.quantity_received_after - alloc.quantity;
            match self
                .orders
                .record_received(&alloc.item_id, before, alloc.quantity_received_after)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    roll_back(undo, &order.order_number).await;
                    return Err(EngineError::Conflict {
                        entity: "PurchaseOrderItem".to_string(),
                        id: alloc.item_id.clone(),
                    });
                }
                Err(e) => {
                    roll_back(undo, &order.order_number).await;
                    return Err(e.into());
                }
            }
            undo.record(format!("unrecord item {}", alloc.item_id), {
                let orders = self.orders.clone();
                let item_id = alloc.item_id.clone();
                let after = alloc.quantity_received_after;
                move || {
                    let orders = orders.clone();
                    let item_id = item_id.clone();
                    async move {
                        if orders.record_received(&item_id, after, before).await? {
                            Ok(())
                        } else {
                            Err(EngineError::Conflict {
                                entity: "PurchaseOrderItem".to_string(),
                                id: item_id,
                            })
                        }
                    }
                }
            });
        }

        if plan.next_status != order.status {
            let moved = self
                .orders
                .update_order_status(tenant_id, &order.id, order.status, plan.next_status)
                .await;
            match moved {
                Ok(true) => {}
                Ok(false) => {
                    roll_back(undo, &order.order_number).await;
                    return Err(EngineError::Conflict {
                        entity: "PurchaseOrder".to_string(),
                        id: order.id.clone(),
                    });
                }
                Err(e) => {
                    roll_back(undo, &order.order_number).await;
                    return Err(e.into());
                }
            }
        }
        undo.commit();

        info!(
            tenant_id,
            order_number = %order.order_number,
            lines = plan.allocations.len(),
            status = %plan.next_status,
            "Purchase order receipt booked"
        );
        self.get_purchase_order(tenant_id, po_id).await
    }

    async fn load(&self, tenant_id: &str, po_id: &str) -> EngineResult<PurchaseOrder> {
        self.orders
            .get_order(tenant_id, po_id)
            .await?
            .ok_or_else(|| EngineError::not_found("PurchaseOrder", po_id))
    }
}

impl std::fmt::Debug for PurchaseOrderProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseOrderProcessor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// A missing tenant shows up as a foreign key failure on the counter or header.
fn tenant_error(err: DbError, tenant_id: &str) -> EngineError {
    match err {
        DbError::ForeignKeyViolation { .. } => EngineError::not_found("Tenant", tenant_id),
        other => other.into(),
    }
}

async fn roll_back(undo: Compensations, order_number: &str) {
    let failures = undo.compensate().await;
    if !failures.is_empty() {
        error!(
            order_number,
            failed = failures.len(),
            "Purchase order changes not fully reversed"
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{edition, engine, engine_with, tenant, FaultyOrders};
    use chrono::Duration;
    use quire_core::purchasing::PurchaseOrderLine;
    use quire_core::ValidationError;

    fn processor(eng: &crate::Engine, orders: FaultyOrders, settings: &PurchasingSettings) -> PurchaseOrderProcessor {
        let catalog = Arc::new(orders.db().clone());
        PurchaseOrderProcessor::new(
            eng.ledger.clone(),
            Arc::new(orders),
            catalog,
            settings,
            &LedgerSettings::default(),
        )
    }

    fn request(lines: Vec<PurchaseOrderLine>) -> NewPurchaseOrder {
        NewPurchaseOrder::new("supplier-7", lines)
    }

    #[tokio::test]
    async fn test_first_orders_are_numbered_from_a0001() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e = edition(&db).await;

        let first = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 10, Money::from_cents(450))]))
            .await
            .unwrap();
        let second = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(450))]))
            .await
            .unwrap();

        assert_eq!(first.order.order_number, "A0001");
        assert_eq!(second.order.order_number, "A0002");
        assert_eq!(first.order.status, PurchaseOrderStatus::Pending);
        assert_eq!(first.order.total_amount_cents, 4500);
        assert_eq!(
            first.order.expected_delivery_date - first.order.order_date,
            Duration::days(5)
        );
        assert_eq!(first.items.len(), 1);

        // numbering is per tenant
        let other = tenant(&db).await;
        let theirs = engine
            .purchasing
            .create_purchase_order(&other, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(450))]))
            .await
            .unwrap();
        assert_eq!(theirs.order.order_number, "A0001");
    }

    #[tokio::test]
    async fn test_declared_total_is_ignored() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e1 = edition(&db).await;
        let e2 = edition(&db).await;

        let mut req = request(vec![
            PurchaseOrderLine::new(&e1, 10, Money::from_cents(450)),
            PurchaseOrderLine::new(&e2, 3, Money::from_cents(1200)),
        ]);
        req.declared_total = Some(Money::from_cents(1));

        let detail = engine.purchasing.create_purchase_order(&t, &req).await.unwrap();
        assert_eq!(detail.order.total_amount_cents, 8100);
    }

    #[tokio::test]
    async fn test_rejections_happen_before_numbering() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e = edition(&db).await;

        let err = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::zero())]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::MustBePositive { .. })));

        let err = engine
            .purchasing
            .create_purchase_order(
                &t,
                &request(vec![
                    PurchaseOrderLine::new(&e, 1, Money::from_cents(100)),
                    PurchaseOrderLine::new("missing", 1, Money::from_cents(100)),
                ]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { line: Some(1), .. }));

        let detail = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]))
            .await
            .unwrap();
        assert_eq!(detail.order.order_number, "A0001");
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found() {
        let (db, engine) = engine().await;
        let e = edition(&db).await;

        let err = engine
            .purchasing
            .create_purchase_order("ghost", &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { ref entity, .. } if entity == "Tenant"));
    }

    #[tokio::test]
    async fn test_failed_item_removes_header_and_burns_number() {
        let (db, _) = engine().await;
        let engine = engine_with(&db, |eng| {
            eng.purchasing = processor(
                eng,
                FaultyOrders::new(db.clone()).fail_item_insert(1),
                &PurchasingSettings::default(),
            );
        });
        let t = tenant(&db).await;
        let e = edition(&db).await;
        let lines = vec![
            PurchaseOrderLine::new(&e, 2, Money::from_cents(100)),
            PurchaseOrderLine::new(&e, 3, Money::from_cents(100)),
        ];

        let err = engine
            .purchasing
            .create_purchase_order(&t, &request(lines))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(db.purchase_orders().list_for_tenant(&t).await.unwrap().is_empty());

        // the compensated order's number is never handed out again
        let detail = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]))
            .await
            .unwrap();
        assert_eq!(detail.order.order_number, "A0002");
    }

    #[tokio::test]
    async fn test_number_collision_retries_with_next() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e = edition(&db).await;
        let line = || request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]);
        engine.purchasing.create_purchase_order(&t, &line()).await.unwrap();

        // a counter that hands out 1 once more, as if it lagged behind
        let stale = engine_with(&db, |eng| {
            eng.purchasing = processor(eng, FaultyOrders::new(db.clone()).stale_seq(1), &PurchasingSettings::default());
        });
        let detail = stale.purchasing.create_purchase_order(&t, &line()).await.unwrap();
        assert_eq!(detail.order.order_number, "A0002");

        // stuck counter with few attempts gives up
        let stuck = engine_with(&db, |eng| {
            eng.purchasing = processor(
                eng,
                FaultyOrders::new(db.clone()).stale_seq(u32::MAX),
                &PurchasingSettings {
                    order_number_attempts: 3,
                    ..PurchasingSettings::default()
                },
            );
        });
        let err = stuck.purchasing.create_purchase_order(&t, &line()).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOrderNumber { ref order_number, .. } if order_number == "A0001"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creations_get_distinct_increasing_numbers() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e = edition(&db).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = engine.clone();
            let (t, e) = (t.clone(), e.clone());
            handles.push(tokio::spawn(async move {
                engine
                    .purchasing
                    .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]))
                    .await
            }));
        }

        let mut seqs = Vec::new();
        for h in handles {
            seqs.push(h.await.unwrap().unwrap().order.order_seq);
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=50).collect::<Vec<i64>>());

        let stored = db.purchase_orders().list_for_tenant(&t).await.unwrap();
        let numbers: Vec<String> = stored.iter().map(|o| o.order_number.clone()).collect();
        assert_eq!(numbers.len(), 50);
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_status_machine() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e = edition(&db).await;
        let po = engine
            .purchasing
            .create_purchase_order(&t, &request(vec![PurchaseOrderLine::new(&e, 1, Money::from_cents(100))]))
            .await
            .unwrap()
            .order;

        let err = engine
            .purchasing
            .transition(&t, &po.id, PurchaseOrderStatus::Received)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));

        assert_eq!(
            engine.purchasing.approve(&t, &po.id).await.unwrap().status,
            PurchaseOrderStatus::Approved
        );
        assert_eq!(
            engine.purchasing.cancel(&t, &po.id).await.unwrap().status,
            PurchaseOrderStatus::Cancelled
        );

        let err = engine.purchasing.approve(&t, &po.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));
    }

    #[tokio::test]
    async fn test_receipts_credit_stock_and_advance_status() {
        let (db, engine) = engine().await;
        let t = tenant(&db).await;
        let e1 = edition(&db).await;
        let e2 = edition(&db).await;
        let po = engine
            .purchasing
            .create_purchase_order(
                &t,
                &request(vec![
                    PurchaseOrderLine::new(&e1, 10, Money::from_cents(450)),
                    PurchaseOrderLine::new(&e2, 5, Money::from_cents(1200)),
                ]),
            )
            .await
            .unwrap()
            .order;

        // not yet approved
        let err = engine
            .purchasing
            .receive_purchase_order(&t, &po.id, &[ReceiptLine::new(&e1, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStatusTransition { .. }));

        engine.purchasing.approve(&t, &po.id).await.unwrap();

        let partial = engine
            .purchasing
            .receive_purchase_order(&t, &po.id, &[ReceiptLine::new(&e1, 4)])
            .await
            .unwrap();
        assert_eq!(partial.order.status, PurchaseOrderStatus::Partial);
        assert_eq!(partial.items[0].quantity_received, 4);
        let stock = engine.ledger.get(&t, &e1).await.unwrap();
        assert_eq!(stock.quantity_on_hand, 4);
        assert_eq!(stock.cost_price_cents, 450);

        let err = engine
            .purchasing
            .receive_purchase_order(&t, &po.id, &[ReceiptLine::new(&e1, 7)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::Inconsistent { .. })));

        let done = engine
            .purchasing
            .receive_purchase_order(&t, &po.id, &[ReceiptLine::new(&e1, 6), ReceiptLine::new(&e2, 5)])
            .await
            .unwrap();
        assert_eq!(done.order.status, PurchaseOrderStatus::Received);
        assert_eq!(engine.ledger.get(&t, &e1).await.unwrap().quantity_on_hand, 10);
        assert_eq!(engine.ledger.get(&t, &e2).await.unwrap().quantity_on_hand, 5);
    }

    #[tokio::test]
    async fn test_failed_receipt_reverses_credits() {
        let (db, _) = engine().await;
        let engine = engine_with(&db, |eng| {
            eng.purchasing = processor(
                eng,
                FaultyOrders::new(db.clone()).reject_receipt(1),
                &PurchasingSettings::default(),
            );
        });
        let t = tenant(&db).await;
        let e1 = edition(&db).await;
        let e2 = edition(&db).await;
        let po = engine
            .purchasing
            .create_purchase_order(
                &t,
                &request(vec![
                    PurchaseOrderLine::new(&e1, 10, Money::from_cents(450)),
                    PurchaseOrderLine::new(&e2, 5, Money::from_cents(1200)),
                ]),
            )
            .await
            .unwrap()
            .order;
        engine.purchasing.approve(&t, &po.id).await.unwrap();
        engine
            .ledger
            .create_or_top_up(&t, &e1, &StockIntake::new(2, Money::from_cents(450)))
            .await
            .unwrap();

        // the second item's received count moves underneath the receipt
        let err = engine
            .purchasing
            .receive_purchase_order(&t, &po.id, &[ReceiptLine::new(&e1, 3), ReceiptLine::new(&e2, 4)])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));

        assert_eq!(engine.ledger.get(&t, &e1).await.unwrap().quantity_on_hand, 2);
        let e2_stock = engine.ledger.get(&t, &e2).await.unwrap();
        assert_eq!(e2_stock.quantity_on_hand, 0);
        let detail = engine.purchasing.get_purchase_order(&t, &po.id).await.unwrap();
        assert!(detail.items.iter().all(|i| i.quantity_received == 0));
        assert_eq!(detail.order.status, PurchaseOrderStatus::Approved);
    }
}
