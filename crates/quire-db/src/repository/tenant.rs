//! # Tenant Repository
//!
//! Tenants are the root owner of every other row; deleting one cascades to
//! its users, stock, sales and purchase orders.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quire_core::Tenant;

const TENANT_COLUMNS: &str = "id, name, contact_email, contact_phone, address, created_at, updated_at";

/// Repository for tenant database operations.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Inserts a tenant.
    ///
    /// ## Errors
    /// `UniqueViolation` on `tenants.name` when the name is taken (any case).
    pub async fn insert(&self, tenant: &Tenant) -> DbResult<()> {
        debug!(id = %tenant.id, name = %tenant.name, "Inserting tenant");

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, contact_email, contact_phone, address, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.contact_email)
        .bind(&tenant.contact_phone)
        .bind(&tenant.address)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: tenant.name.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE id = ?1",
            TENANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Looks a tenant up by name, ignoring case.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE name = ?1 COLLATE NOCASE",
            TENANT_COLUMNS
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    /// Deletes a tenant and, through the cascade, everything it owns.
    ///
    /// Returns `false` when no tenant had the id.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting tenant");

        let result = sqlx::query("DELETE FROM tenants WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
