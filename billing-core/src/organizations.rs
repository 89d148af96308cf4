//! Organization management.
//!
//! Organizations are the tenant roots. Visibility is wider here than for
//! clinical entities: an Admin may see every organization, everyone else
//! sees their own plus its declared children.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::models::Organization;
use crate::principal::Principal;
use crate::time::now_epoch;
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganization {
    pub name: String,
    pub addresses: Option<serde_json::Value>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub npi: Option<String>,
    pub parent_organization_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub addresses: Option<serde_json::Value>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub npi: Option<String>,
    pub parent_organization_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationListParams {
    pub search: Option<String>,
    pub parent_organization_id: Option<Uuid>,
}

pub struct OrganizationService {
    pool: DatabasePool,
}

impl OrganizationService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &OrganizationListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<Organization>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM organizations");
        push_org_filters(&mut count_query, principal, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM organizations");
        push_org_filters(&mut query, principal, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let organizations: Vec<Organization> =
            query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((organizations, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<Organization> {
        let organization: Option<Organization> =
            sqlx::query_as("SELECT * FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await?;

        match organization {
            Some(org) if can_see(principal, &org) => Ok(org),
            // Masked: outside the caller's visibility an org simply does not exist.
            _ => Err(BillingError::not_found(
                Entity::Organization,
                "Organization not found",
            )),
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        req: CreateOrganization,
    ) -> BillingResult<Organization> {
        if req.name.trim().is_empty() {
            return Err(BillingError::validation(
                Entity::Organization,
                "Organization name is required",
            ));
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        if let Some(parent_id) = req.parent_organization_id {
            ensure_parent_exists(&mut tx, parent_id).await?;
        }

        let now = now_epoch();
        let organization: Organization = sqlx::query_as(
            r#"
            INSERT INTO organizations (
                id, name, addresses, phone, email, npi, parent_organization_id,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(req.addresses.unwrap_or_else(|| serde_json::json!([])))
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.npi)
        .bind(req.parent_organization_id)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(organization)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateOrganization,
    ) -> BillingResult<Organization> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Organization> =
            sqlx::query_as("SELECT * FROM organizations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = existing.ok_or_else(|| {
            BillingError::not_found(Entity::Organization, "Organization not found")
        })?;
        if !principal.is_admin() && existing.id != principal.organization_id {
            return Err(BillingError::forbidden(
                Entity::Organization,
                "Cannot update organizations outside your access scope",
            ));
        }

        if let Some(parent_id) = req.parent_organization_id {
            ensure_parent_exists(&mut tx, parent_id).await?;
        }

        let now = now_epoch();
        let organization: Organization = sqlx::query_as(
            r#"
            UPDATE organizations
            SET
                name = COALESCE($2, name),
                addresses = COALESCE($3, addresses),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                npi = COALESCE($6, npi),
                parent_organization_id = COALESCE($7, parent_organization_id),
                updated_by = $8,
                updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.addresses)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.npi)
        .bind(req.parent_organization_id)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(organization)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Organization> =
            sqlx::query_as("SELECT * FROM organizations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = existing.ok_or_else(|| {
            BillingError::not_found(Entity::Organization, "Organization not found")
        })?;
        if !principal.is_admin() && existing.id != principal.organization_id {
            return Err(BillingError::forbidden(
                Entity::Organization,
                "Cannot delete organizations outside your access scope",
            ));
        }

        // One statement, one snapshot: a dependent created between the check
        // and the delete cannot slip through.
        let counts: (i64, i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE organization_id = $1),
                (SELECT COUNT(*) FROM patients WHERE organization_id = $1),
                (SELECT COUNT(*) FROM providers WHERE organization_id = $1),
                (SELECT COUNT(*) FROM visits WHERE organization_id = $1),
                (SELECT COUNT(*) FROM claims WHERE organization_id = $1),
                (SELECT COUNT(*) FROM rules WHERE organization_id = $1),
                (SELECT COUNT(*) FROM payors WHERE organization_id = $1),
                (SELECT COUNT(*) FROM organizations WHERE parent_organization_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_dependents(
            Entity::Organization,
            "Organization has dependent records and cannot be deleted",
            &[
                ("users", counts.0),
                ("patients", counts.1),
                ("providers", counts.2),
                ("visits", counts.3),
                ("claims", counts.4),
                ("rules", counts.5),
                ("payors", counts.6),
                ("child organizations", counts.7),
            ],
        )?;

        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn can_see(principal: &Principal, org: &Organization) -> bool {
    principal.is_admin()
        || org.id == principal.organization_id
        || org.parent_organization_id == Some(principal.organization_id)
}

fn push_org_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    principal: &Principal,
    params: &OrganizationListParams,
) {
    query.push(" WHERE 1 = 1");
    if !principal.is_admin() {
        query.push(" AND (id = ");
        query.push_bind(principal.organization_id);
        query.push(" OR parent_organization_id = ");
        query.push_bind(principal.organization_id);
        query.push(")");
    }
    if let Some(search) = &params.search {
        query.push(" AND name ILIKE ");
        query.push_bind(format!("%{}%", search));
    }
    if let Some(parent_id) = params.parent_organization_id {
        query.push(" AND parent_organization_id = ");
        query.push_bind(parent_id);
    }
}

async fn ensure_parent_exists(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    parent_id: Uuid,
) -> BillingResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM organizations WHERE id = $1)")
            .bind(parent_id)
            .fetch_one(&mut **tx)
            .await?;
    if !exists {
        return Err(BillingError::foreign_key(
            Entity::Organization,
            "Parent organization not found",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn org(id: Uuid, parent: Option<Uuid>) -> Organization {
        Organization {
            id,
            name: "North Clinic".into(),
            addresses: serde_json::json!([]),
            phone: None,
            email: None,
            npi: None,
            parent_organization_id: parent,
            created_by: None,
            updated_by: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn admins_see_every_organization() {
        let admin = Principal::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Admin);
        assert!(can_see(&admin, &org(Uuid::new_v4(), None)));
    }

    #[test]
    fn non_admins_see_own_and_children_only() {
        let own_org = Uuid::new_v4();
        let biller = Principal::new(Uuid::new_v4(), own_org, UserRole::Biller);

        assert!(can_see(&biller, &org(own_org, None)));
        assert!(can_see(&biller, &org(Uuid::new_v4(), Some(own_org))));
        assert!(!can_see(&biller, &org(Uuid::new_v4(), None)));
    }
}
