use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the acting principal, applied to every transaction.
///
/// The values end up as `SET LOCAL` GUCs (`app.current_user_id`,
/// `app.organization_id`, `app.user_role`) so database-side policies and
/// triggers observe the same tenant boundary the application enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantScope {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
}

impl TenantScope {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            user_id,
            organization_id,
            role: role.into(),
        }
    }

    /// Build the `SET LOCAL` statement applied at transaction start.
    ///
    /// Uuids and the role (a closed enum rendered to a short ASCII token)
    /// cannot contain quotes, so direct interpolation is safe here.
    pub fn set_local_sql(&self) -> String {
        format!(
            "SET LOCAL app.current_user_id = '{}'; \
             SET LOCAL app.organization_id = '{}'; \
             SET LOCAL app.user_role = '{}';",
            self.user_id, self.organization_id, self.role
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_local_sql_carries_all_gucs() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let scope = TenantScope::new(user, org, "Biller");
        let sql = scope.set_local_sql();

        assert!(sql.contains(&format!("app.current_user_id = '{}'", user)));
        assert!(sql.contains(&format!("app.organization_id = '{}'", org)));
        assert!(sql.contains("app.user_role = 'Biller'"));
    }
}
