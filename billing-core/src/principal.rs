use crate::error::{BillingError, BillingResult};
use crate::models::UserRole;
use database_layer::TenantScope;
use error_common::Entity;
use uuid::Uuid;

/// The authenticated caller, as resolved by the session provider upstream.
///
/// The core never sees credentials; it only consumes this already-resolved
/// identity and enforces the tenant boundary with it.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: UserRole,
}

impl Principal {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Tenant scope applied to every transaction this principal opens.
    pub fn scope(&self) -> TenantScope {
        TenantScope::new(self.user_id, self.organization_id, self.role.as_str())
    }

    /// Reject writes whose payload names a foreign organization. Cross-tenant
    /// writes never partially succeed; they fail here before any mutation.
    pub fn ensure_own_org(
        &self,
        organization_id: Uuid,
        entity: Entity,
        message: &str,
    ) -> BillingResult<()> {
        if self.organization_id != organization_id {
            return Err(BillingError::forbidden(entity, message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_org_writes_are_forbidden() {
        let principal = Principal::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Biller);
        let other_org = Uuid::new_v4();

        let err = principal
            .ensure_own_org(other_org, Entity::Claim, "Cannot create claims outside your organization")
            .unwrap_err();
        assert!(matches!(err, BillingError::Forbidden { .. }));

        assert!(principal
            .ensure_own_org(principal.organization_id, Entity::Claim, "unused")
            .is_ok());
    }

    #[test]
    fn scope_carries_role_token() {
        let principal = Principal::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::FrontDesk);
        assert_eq!(principal.scope().role, "FrontDesk");
    }
}
