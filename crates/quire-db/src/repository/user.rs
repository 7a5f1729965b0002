//! # User Repository
//!
//! Staff accounts. Credentials live with the authentication service; this
//! table only records identity, tenant and role.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use quire_core::User;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a user.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the email is already registered
    /// - `ForeignKeyViolation` when the tenant does not exist
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, tenant_id = %user.tenant_id, role = %user.role, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, full_name, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.tenant_id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: user.email.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, tenant_id, email, full_name, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list_for_tenant(&self, tenant_id: &str) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, tenant_id, email, full_name, role, created_at
            FROM users
            WHERE tenant_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{db, tenant, user};
    use crate::DbError;
    use quire_core::Role;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let t = tenant("Riverside Books");
        db.tenants().insert(&t).await.unwrap();

        let u = user(&t.id, "ada@riverside.example");
        db.users().insert(&u).await.unwrap();

        let loaded = db.users().get_by_id(&u.id).await.unwrap().unwrap();
        assert_eq!(loaded.role, Role::Admin);
        assert_eq!(db.users().list_for_tenant(&t.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = db().await;
        let t = tenant("Riverside Books");
        db.tenants().insert(&t).await.unwrap();
        db.users().insert(&user(&t.id, "ada@riverside.example")).await.unwrap();

        let err = db
            .users()
            .insert(&user(&t.id, "ADA@riverside.example"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("users.email"));
    }

    #[tokio::test]
    async fn test_unknown_tenant_rejected() {
        let db = db().await;
        let err = db.users().insert(&user("missing", "x@y.example")).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_tenant_delete_cascades_to_users() {
        let db = db().await;
        let t = tenant("Riverside Books");
        db.tenants().insert(&t).await.unwrap();
        let u = user(&t.id, "ada@riverside.example");
        db.users().insert(&u).await.unwrap();

        db.tenants().delete(&t.id).await.unwrap();
        assert!(db.users().get_by_id(&u.id).await.unwrap().is_none());
    }
}
