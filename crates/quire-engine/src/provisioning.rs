//! # Tenant Provisioning
//!
//! Creates a shop account together with its first administrator.
//!
//! ```text
//! provision_tenant(tenant, admin)
//!      │
//!      ├── validate both payloads ─────────────► Validation (nothing written)
//!      │
//!      ├── 1. insert tenant ── name taken ─────► DuplicateName
//!      │        └── record undo: delete tenant
//!      │
//!      └── 2. insert admin (role forced to admin)
//!               └── err ─► delete tenant, return the user error
//!                          (a failed delete is logged, the user error wins)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use quire_core::validation::{validate_email, validate_full_name, validate_required, validate_tenant_name};
use quire_core::{NewTenant, NewUser, Role, Tenant, User};

use crate::config::LedgerSettings;
use crate::error::{EngineError, EngineResult};
use crate::saga::Compensations;
use crate::store::{TenantStore, UserStore};

/// A freshly provisioned tenant and its administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub admin: User,
}

#[derive(Clone)]
pub struct TenantProvisioner {
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    compensation_attempts: u32,
}

impl TenantProvisioner {
    pub fn new(tenants: Arc<dyn TenantStore>, users: Arc<dyn UserStore>, settings: &LedgerSettings) -> Self {
        TenantProvisioner {
            tenants,
            users,
            compensation_attempts: settings.compensation_attempts,
        }
    }

    /// Creates the tenant, then its admin user.
    ///
    /// ## Errors
    /// - `Validation` for a malformed tenant or admin payload
    /// - `DuplicateName` if the tenant name is taken, in any letter case
    /// - `DuplicateEmail` if the admin email is already registered; the
    ///   tenant has been removed again
    pub async fn provision_tenant(&self, tenant: &NewTenant, admin: &NewUser) -> EngineResult<ProvisionedTenant> {
        validate_tenant_name(&tenant.name)?;
        validate_email("contact_email", &tenant.contact_email)?;
        validate_email("admin.email", &admin.email)?;
        validate_full_name(&admin.full_name)?;

        let name = tenant.name.trim();
        if self.tenants.find_tenant_by_name(name).await?.is_some() {
            return Err(EngineError::DuplicateName(name.to_string()));
        }

        let now = Utc::now();
        let record = Tenant {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            contact_email: tenant.contact_email.trim().to_string(),
            contact_phone: tenant.contact_phone.clone(),
            address: tenant.address.clone(),
            created_at: now,
            updated_at: now,
        };

        match self.tenants.insert_tenant(&record).await {
            Ok(()) => {}
            // lost a race with another provisioning of the same name
            Err(e) if e.is_unique_violation_on("tenants") => {
                return Err(EngineError::DuplicateName(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let mut undo = Compensations::new("provision_tenant", self.compensation_attempts);
        undo.record(format!("delete tenant {}", record.id), {
            let tenants = self.tenants.clone();
            let tenant_id = record.id.clone();
            move || {
                let tenants = tenants.clone();
                let tenant_id = tenant_id.clone();
                async move {
                    tenants.delete_tenant(&tenant_id).await?;
                    Ok(())
                }
            }
        });

        let user = User {
            id: Uuid::new_v4().to_string(),
            tenant_id: record.id.clone(),
            email: admin.email.trim().to_string(),
            full_name: admin.full_name.trim().to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        };

        if let Err(e) = self.users.insert_user(&user).await {
            warn!(tenant_id = %record.id, error = %e, "Admin creation failed, removing tenant");
            let failures = undo.compensate().await;
            if !failures.is_empty() {
                error!(
                    tenant_id = %record.id,
                    name = %record.name,
                    "Tenant left without an admin after failed rollback"
                );
            }
            return Err(if e.is_unique_violation_on("users") {
                EngineError::DuplicateEmail(user.email)
            } else {
                e.into()
            });
        }
        undo.commit();

        info!(tenant_id = %record.id, name = %record.name, admin_id = %user.id, "Tenant provisioned");
        Ok(ProvisionedTenant {
            tenant: record,
            admin: user,
        })
    }

    /// True if no tenant holds `name`, ignoring case.
    pub async fn is_name_available(&self, name: &str) -> EngineResult<bool> {
        validate_required("name", name)?;
        Ok(self.tenants.find_tenant_by_name(name).await?.is_none())
    }

    /// Deletes a tenant with its users, stock, sales and orders.
    pub async fn remove_tenant(&self, tenant_id: &str) -> EngineResult<()> {
        validate_required("tenant_id", tenant_id)?;
        if !self.tenants.delete_tenant(tenant_id).await? {
            return Err(EngineError::not_found("Tenant", tenant_id));
        }
        info!(tenant_id, "Tenant removed");
        Ok(())
    }
}

impl std::fmt::Debug for TenantProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantProvisioner")
            .field("compensation_attempts", &self.compensation_attempts)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, engine_with, FailingUsers, StuckTenants};
    use quire_core::ValidationError;
    use quire_db::DbError;

    fn shop(name: &str) -> NewTenant {
        NewTenant {
            name: name.to_string(),
            contact_email: "owner@example.com".to_string(),
            ..NewTenant::default()
        }
    }

    fn admin(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            full_name: "Ada Reader".to_string(),
        }
    }

    #[tokio::test]
    async fn test_provision_creates_tenant_and_admin() {
        let (db, engine) = engine().await;

        let created = engine
            .provisioning
            .provision_tenant(&shop("  Corner Books "), &admin("ada@example.com"))
            .await
            .unwrap();

        assert_eq!(created.tenant.name, "Corner Books");
        assert_eq!(created.admin.role, Role::Admin);
        assert_eq!(created.admin.tenant_id, created.tenant.id);
        assert!(db.users().get_by_id(&created.admin.id).await.unwrap().is_some());
        assert!(!engine.provisioning.is_name_available("corner books").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_any_case() {
        let (_db, engine) = engine().await;
        engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("ada@example.com"))
            .await
            .unwrap();

        let err = engine
            .provisioning
            .provision_tenant(&shop("CORNER BOOKS"), &admin("bob@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn test_duplicate_admin_email_removes_tenant() {
        let (db, engine) = engine().await;
        engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("ada@example.com"))
            .await
            .unwrap();
        let before = db.tenants().count().await.unwrap();

        let err = engine
            .provisioning
            .provision_tenant(&shop("Harbour Books"), &admin("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::DuplicateEmail(ref e) if e == "ada@example.com"));
        assert_eq!(db.tenants().count().await.unwrap(), before);
        assert!(engine.provisioning.is_name_available("Harbour Books").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let (db, engine) = engine().await;

        let err = engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidFormat { .. })));

        let err = engine
            .provisioning
            .provision_tenant(&shop("X"), &admin("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::TooShort { .. })));

        assert_eq!(db.tenants().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_admin_step_leaves_no_tenant() {
        let (db, _) = engine().await;
        let engine = engine_with(&db, |eng| {
            eng.provisioning = TenantProvisioner::new(
                Arc::new(db.clone()),
                Arc::new(FailingUsers),
                &LedgerSettings::default(),
            );
        });

        let err = engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Storage(DbError::QueryFailed(_))));
        assert_eq!(db.tenants().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_still_reports_user_error() {
        let (db, _) = engine().await;
        let engine = engine_with(&db, |eng| {
            eng.provisioning = TenantProvisioner::new(
                Arc::new(StuckTenants(db.clone())),
                Arc::new(FailingUsers),
                &LedgerSettings {
                    compensation_attempts: 2,
                    ..LedgerSettings::default()
                },
            );
        });

        let err = engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Storage(DbError::QueryFailed(_))));
        // orphaned, and visible as such
        assert_eq!(db.tenants().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_tenant() {
        let (_db, engine) = engine().await;
        let created = engine
            .provisioning
            .provision_tenant(&shop("Corner Books"), &admin("ada@example.com"))
            .await
            .unwrap();

        engine.provisioning.remove_tenant(&created.tenant.id).await.unwrap();
        assert!(engine.provisioning.is_name_available("Corner Books").await.unwrap());

        let err = engine.provisioning.remove_tenant(&created.tenant.id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
