//! # Purchase Order Repository
//!
//! Purchase orders, their items and the per-tenant order number counter.
//!
//! ## Order Number Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  next_order_seq(tenant)                                                │
//! │                                                                         │
//! │  INSERT INTO purchase_order_sequences (tenant_id, last_seq)            │
//! │  VALUES (:t, MAX(order_seq of :t) + 1)        ← first order: seeded    │
//! │  ON CONFLICT DO UPDATE SET last_seq = last_seq + 1                     │
//! │  RETURNING last_seq                                                     │
//! │                                                                         │
//! │  One statement: concurrent callers each get a distinct value.         │
//! │  The counter never goes down, so a deleted order's number is not       │
//! │  handed out again.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quire_core::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus};

const ORDER_COLUMNS: &str = r#"
    id, tenant_id, supplier_id, order_seq, order_number, status,
    total_amount_cents, order_date, expected_delivery_date, created_at, updated_at
"#;

const ITEM_COLUMNS: &str =
    "id, po_id, line_no, edition_id, quantity_ordered, quantity_received, unit_cost_cents";

/// Repository for purchase order database operations.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    /// Allocates the next order sequence for a tenant.
    ///
    /// ## Errors
    /// `ForeignKeyViolation` when the tenant does not exist.
    pub async fn next_order_seq(&self, tenant_id: &str) -> DbResult<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO purchase_order_sequences (tenant_id, last_seq)
            VALUES (
                ?1,
                COALESCE((SELECT MAX(order_seq) FROM purchase_orders WHERE tenant_id = ?1), 0) + 1
            )
            ON CONFLICT(tenant_id) DO UPDATE SET
                last_seq = MAX(purchase_order_sequences.last_seq + 1, excluded.last_seq)
            RETURNING last_seq
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(tenant_id = %tenant_id, seq, "Allocated order sequence");
        Ok(seq)
    }

    /// Inserts an order header.
    ///
    /// ## Errors
    /// `UniqueViolation` on `purchase_orders` when the order number is taken.
    pub async fn insert_header(&self, order: &PurchaseOrder) -> DbResult<()> {
        debug!(
            id = %order.id,
            tenant_id = %order.tenant_id,
            order_number = %order.order_number,
            "Inserting purchase order"
        );

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, tenant_id, supplier_id, order_seq, order_number, status,
                total_amount_cents, order_date, expected_delivery_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.supplier_id)
        .bind(order.order_seq)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.total_amount_cents)
        .bind(order.order_date)
        .bind(order.expected_delivery_date)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: order.order_number.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn insert_item(&self, item: &PurchaseOrderItem) -> DbResult<()> {
        debug!(po_id = %item.po_id, line_no = item.line_no, edition_id = %item.edition_id, "Inserting order item");

        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                id, po_id, line_no, edition_id, quantity_ordered, quantity_received, unit_cost_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.po_id)
        .bind(item.line_no)
        .bind(&item.edition_id)
        .bind(item.quantity_ordered)
        .bind(item.quantity_received)
        .bind(item.unit_cost_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes one item. Used to undo a partially written order.
    pub async fn delete_item(&self, item_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM purchase_order_items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes an order header (and, by cascade, any items left).
    pub async fn delete_header(&self, tenant_id: &str, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM purchase_orders WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = ?1 AND tenant_id = ?2",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn get_items(&self, po_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(&format!(
            "SELECT {} FROM purchase_order_items WHERE po_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))
        .bind(po_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Orders of a tenant, by sequence.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> DbResult<Vec<PurchaseOrder>> {
        let orders = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {} FROM purchase_orders WHERE tenant_id = ?1 ORDER BY order_seq",
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Moves an order from `from` to `to`; `false` if it was no longer in `from`.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_orders SET status = ?1, updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4 AND status = ?5
            "#,
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(tenant_id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets an item's received quantity if it still holds `expected`.
    pub async fn record_received(&self, item_id: &str, expected: i64, received: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchase_order_items SET quantity_received = ?1
            WHERE id = ?2 AND quantity_received = ?3
            "#,
        )
        .bind(received)
        .bind(item_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
