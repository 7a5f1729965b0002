//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. STOCK DEBITED (quire-engine, through the ledger)                   │
//! │                                                                         │
//! │  2. INSERT                                                             │
//! │     └── insert(sale, items) → header + every item, one transaction    │
//! │                                                                         │
//! │  3. STATUS                                                             │
//! │     └── update_status(pending → paid | cancelled, paid → cancelled)    │
//! │                                                                         │
//! │  A sale is never visible without all of its items.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use quire_core::{Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = r#"
    id, tenant_id, status, payment_method,
    amount_received_cents, change_given_cents, total_amount_cents,
    customer_name, customer_phone, customer_email,
    sold_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, sale_id, line_no, edition_id, quantity_sold,
    unit_price_cents, tax_cents, discount_cents, line_total_cents, created_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale header and all of its items in one transaction.
    pub async fn insert(&self, sale: &Sale, items: &[SaleItem]) -> DbResult<()> {
        debug!(
            id = %sale.id,
            tenant_id = %sale.tenant_id,
            items = items.len(),
            total = sale.total_amount_cents,
            "Inserting sale"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, status, payment_method,
                amount_received_cents, change_given_cents, total_amount_cents,
                customer_name, customer_phone, customer_email,
                sold_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(sale.status)
        .bind(sale.payment_method)
        .bind(sale.amount_received_cents)
        .bind(sale.change_given_cents)
        .bind(sale.total_amount_cents)
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(&sale.customer_email)
        .bind(sale.sold_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, line_no, edition_id, quantity_sold,
                    unit_price_cents, tax_cents, discount_cents, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(item.line_no)
            .bind(&item.edition_id)
            .bind(item.quantity_sold)
            .bind(item.unit_price_cents)
            .bind(item.tax_cents)
            .bind(item.discount_cents)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a sale by ID, scoped to the tenant.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = ?1 AND tenant_id = ?2",
            SALE_COLUMNS
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale in line order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Moves a sale from `from` to `to`.
    ///
    /// Returns `false` when the sale was not in `from` any more, which lets two
    /// concurrent cancellations resolve to exactly one winner.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET status = ?1, updated_at = ?2
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

    pub async fn count_for_tenant(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, tenant_with_edition};
    use crate::DbError;
    use quire_core::PaymentMethod;
    use uuid::Uuid;

    fn sale(tenant_id: &str) -> Sale {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            status: SaleStatus::Paid,
            payment_method: PaymentMethod::MobileMoney,
            amount_received_cents: Some(5000),
            change_given_cents: Some(500),
            total_amount_cents: 4500,
            customer_name: Some("Wanjiru".to_string()),
            customer_phone: None,
            customer_email: None,
            sold_at: now,
            updated_at: now,
        }
    }

    fn item(sale_id: &str, edition_id: &str, line_no: i64) -> SaleItem {
        SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            line_no,
            edition_id: edition_id.to_string(),
            quantity_sold: 2,
            unit_price_cents: 2250,
            tax_cents: None,
            discount_cents: None,
            line_total_cents: 4500,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_with_items() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        let s = sale(&t);

        db.sales().insert(&s, &[item(&s.id, &e, 0)]).await.unwrap();

        let loaded = db.sales().get_by_id(&t, &s.id).await.unwrap().unwrap();
        assert_eq!(loaded.payment_method, PaymentMethod::MobileMoney);
        assert_eq!(loaded.status, SaleStatus::Paid);
        assert_eq!(db.sales().get_items(&s.id).await.unwrap().len(), 1);

        // other tenants don't see it
        assert!(db.sales().get_by_id("other", &s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_item_leaves_no_header() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        let s = sale(&t);

        // same line number twice violates the unique line index
        let err = db
            .sales()
            .insert(&s, &[item(&s.id, &e, 0), item(&s.id, &e, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        assert!(db.sales().get_by_id(&t, &s.id).await.unwrap().is_none());
        assert_eq!(db.sales().count_for_tenant(&t).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_status_is_guarded() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        let s = sale(&t);
        db.sales().insert(&s, &[item(&s.id, &e, 0)]).await.unwrap();

        assert!(db
            .sales()
            .update_status(&t, &s.id, SaleStatus::Paid, SaleStatus::Cancelled)
            .await
            .unwrap());
        assert!(!db
            .sales()
            .update_status(&t, &s.id, SaleStatus::Paid, SaleStatus::Cancelled)
            .await
            .unwrap());
    }
}
