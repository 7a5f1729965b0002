//! # Stock Repository
//!
//! Stock records and their movement journal.
//!
//! ## Compare-and-Set Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE stock_records                                                 │
//! │       SET quantity_on_hand = :new, version = version + 1                │
//! │     WHERE tenant_id = :t AND edition_id = :e AND version = :expected    │
//! │       │                                                                 │
//! │       ├── 0 rows → ROLLBACK, VersionConflict                           │
//! │       ▼                                                                 │
//! │    INSERT INTO stock_movements (tenant_id, movement_key, delta, ...)    │
//! │       │                                                                 │
//! │       ├── key already used → ROLLBACK, UniqueViolation                 │
//! │       ▼                                                                 │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  The quantity and its journal row land together or not at all.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The UPDATE runs first so the transaction takes SQLite's write lock before
//! it reads anything.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use quire_core::{StockMovement, StockRecord};

const STOCK_COLUMNS: &str = r#"
    id, tenant_id, edition_id,
    quantity_on_hand, quantity_reserved, reorder_level,
    cost_price_cents, profit_bps, discount_bps, location,
    version, created_at, updated_at
"#;

const MOVEMENT_COLUMNS: &str = "id, tenant_id, edition_id, movement_key, delta, on_hand_after, created_at";

/// A guarded on-hand update.
#[derive(Debug, Clone)]
pub struct StockWrite<'a> {
    pub tenant_id: &'a str,
    pub edition_id: &'a str,
    /// Version the caller read; the write fails if the row moved on.
    pub expected_version: i64,
    pub new_on_hand: i64,
    pub delta: i64,
    /// Idempotency key recorded in the journal.
    pub movement_key: &'a str,
}

/// Repository for stock database operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Gets the stock record for a (tenant, edition) pair.
    pub async fn find(&self, tenant_id: &str, edition_id: &str) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(&format!(
            "SELECT {} FROM stock_records WHERE tenant_id = ?1 AND edition_id = ?2",
            STOCK_COLUMNS
        ))
        .bind(tenant_id)
        .bind(edition_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Inserts a new stock record and journals its opening quantity.
    ///
    /// ## Errors
    /// - `UniqueViolation` on `stock_records` when the pair already has a
    ///   record, or on `stock_movements` when the key was used
    /// - `ForeignKeyViolation` when the tenant or edition does not exist
    pub async fn insert(&self, record: &StockRecord, movement_key: &str) -> DbResult<()> {
        debug!(
            tenant_id = %record.tenant_id,
            edition_id = %record.edition_id,
            on_hand = record.quantity_on_hand,
            "Inserting stock record"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stock_records (
                id, tenant_id, edition_id,
                quantity_on_hand, quantity_reserved, reorder_level,
                cost_price_cents, profit_bps, discount_bps, location,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.edition_id)
        .bind(record.quantity_on_hand)
        .bind(record.quantity_reserved)
        .bind(record.reorder_level)
        .bind(record.cost_price_cents)
        .bind(record.profit_bps)
        .bind(record.discount_bps)
        .bind(&record.location)
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_movement(
            &mut tx,
            &record.tenant_id,
            &record.edition_id,
            movement_key,
            record.quantity_on_hand,
            record.quantity_on_hand,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Applies a guarded on-hand update and journals it atomically.
    ///
    /// Returns the record as written.
    ///
    /// ## Errors
    /// - `VersionConflict` when the row is no longer at `expected_version`
    /// - `UniqueViolation` on `stock_movements` when the key was already used
    /// - `CheckViolation` if the new quantity breaks `on_hand >= reserved`
    pub async fn compare_and_set(&self, write: &StockWrite<'_>) -> DbResult<StockRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE stock_records SET
                quantity_on_hand = ?1,
                version = version + 1,
                updated_at = ?2
            WHERE tenant_id = ?3 AND edition_id = ?4 AND version = ?5
            "#,
        )
        .bind(write.new_on_hand)
        .bind(now)
        .bind(write.tenant_id)
        .bind(write.edition_id)
        .bind(write.expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::VersionConflict {
                entity: "StockRecord".to_string(),
                id: format!("{}/{}", write.tenant_id, write.edition_id),
                expected: write.expected_version,
            });
        }

        insert_movement(
            &mut tx,
            write.tenant_id,
            write.edition_id,
            write.movement_key,
            write.delta,
            write.new_on_hand,
        )
        .await?;

        let record = sqlx::query_as::<_, StockRecord>(&format!(
            "SELECT {} FROM stock_records WHERE tenant_id = ?1 AND edition_id = ?2",
            STOCK_COLUMNS
        ))
        .bind(write.tenant_id)
        .bind(write.edition_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            tenant_id = %write.tenant_id,
            edition_id = %write.edition_id,
            delta = write.delta,
            on_hand = record.quantity_on_hand,
            version = record.version,
            "Stock updated"
        );

        Ok(record)
    }

    /// Looks up an applied movement by its idempotency key.
    pub async fn movement_by_key(&self, tenant_id: &str, movement_key: &str) -> DbResult<Option<StockMovement>> {
        let movement = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE tenant_id = ?1 AND movement_key = ?2",
            MOVEMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(movement_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movement)
    }

    /// Applied movements for one record, oldest first.
    pub async fn movements(&self, tenant_id: &str, edition_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            r#"
            SELECT {} FROM stock_movements
            WHERE tenant_id = ?1 AND edition_id = ?2
            ORDER BY created_at, rowid
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(edition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// All stock records of a tenant.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> DbResult<Vec<StockRecord>> {
        let records = sqlx::query_as::<_, StockRecord>(&format!(
            "SELECT {} FROM stock_records WHERE tenant_id = ?1 ORDER BY created_at, rowid",
            STOCK_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

async fn insert_movement(
    tx: &mut Transaction<'_, Sqlite>,
    tenant_id: &str,
    edition_id: &str,
    movement_key: &str,
    delta: i64,
    on_hand_after: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, tenant_id, edition_id, movement_key, delta, on_hand_after, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_id)
    .bind(edition_id)
    .bind(movement_key)
    .bind(delta)
    .bind(on_hand_after)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: movement_key.to_string(),
        },
        other => other,
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, tenant_with_edition};

    fn new_record(tenant_id: &str, edition_id: &str, on_hand: i64, reserved: i64) -> StockRecord {
        let now = Utc::now();
        StockRecord {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            edition_id: edition_id.to_string(),
            quantity_on_hand: on_hand,
            quantity_reserved: reserved,
            reorder_level: 5,
            cost_price_cents: 1000,
            profit_bps: 2500,
            discount_bps: 1000,
            location: Some("A-3".to_string()),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        db.stock().insert(&new_record(&t, &e, 10, 2), "intake:1").await.unwrap();

        let found = db.stock().find(&t, &e).await.unwrap().unwrap();
        assert_eq!(found.quantity_on_hand, 10);
        assert_eq!(found.profit_bps, 2500);
        assert_eq!(found.sale_price().cents(), 1125);

        let journal = db.stock().movements(&t, &e).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].delta, 10);
    }

    #[tokio::test]
    async fn test_duplicate_pair_rejected() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        db.stock().insert(&new_record(&t, &e, 10, 0), "intake:1").await.unwrap();

        let err = db.stock().insert(&new_record(&t, &e, 3, 0), "intake:2").await.unwrap_err();
        assert!(err.is_unique_violation_on("stock_records"));
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        db.stock().insert(&new_record(&t, &e, 10, 0), "intake:1").await.unwrap();

        let written = db
            .stock()
            .compare_and_set(&StockWrite {
                tenant_id: &t,
                edition_id: &e,
                expected_version: 0,
                new_on_hand: 7,
                delta: -3,
                movement_key: "sale:1:line:0",
            })
            .await
            .unwrap();
        assert_eq!(written.quantity_on_hand, 7);
        assert_eq!(written.version, 1);

        // stale version
        let err = db
            .stock()
            .compare_and_set(&StockWrite {
                tenant_id: &t,
                edition_id: &e,
                expected_version: 0,
                new_on_hand: 4,
                delta: -3,
                movement_key: "sale:2:line:0",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { expected: 0, .. }));
        assert_eq!(db.stock().find(&t, &e).await.unwrap().unwrap().quantity_on_hand, 7);
    }

    #[tokio::test]
    async fn test_reused_key_rolls_back_update() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        db.stock().insert(&new_record(&t, &e, 10, 0), "intake:1").await.unwrap();

        let write = StockWrite {
            tenant_id: &t,
            edition_id: &e,
            expected_version: 0,
            new_on_hand: 7,
            delta: -3,
            movement_key: "sale:1:line:0",
        };
        db.stock().compare_and_set(&write).await.unwrap();

        let again = StockWrite {
            expected_version: 1,
            new_on_hand: 4,
            ..write
        };
        let err = db.stock().compare_and_set(&again).await.unwrap_err();
        assert!(err.is_unique_violation_on("stock_movements"));

        let record = db.stock().find(&t, &e).await.unwrap().unwrap();
        assert_eq!(record.quantity_on_hand, 7);
        assert_eq!(record.version, 1);
        assert!(db.stock().movement_by_key(&t, "sale:1:line:0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reserved_check_enforced_by_schema() {
        let db = db().await;
        let (t, e) = tenant_with_edition(&db, "Riverside Books").await;
        db.stock().insert(&new_record(&t, &e, 10, 4), "intake:1").await.unwrap();

        let err = db
            .stock()
            .compare_and_set(&StockWrite {
                tenant_id: &t,
                edition_id: &e,
                expected_version: 0,
                new_on_hand: 3,
                delta: -7,
                movement_key: "bad",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation(_)));
    }
}
