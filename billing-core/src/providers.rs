//! Provider registry. NPIs are unique within an organization when present.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{DataSource, LicenseType, Provider};
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{scoped_value_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProvider {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub npi: Option<String>,
    pub specialty: Option<String>,
    pub license_type: LicenseType,
    pub organization_id: Uuid,
    pub source: DataSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProvider {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub npi: Option<String>,
    pub specialty: Option<String>,
    pub license_type: Option<LicenseType>,
    pub source: Option<DataSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderListParams {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub license_type: Option<LicenseType>,
    pub source: Option<DataSource>,
}

pub struct ProviderService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl ProviderService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &ProviderListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<Provider>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM providers");
        push_provider_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM providers");
        push_provider_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let providers: Vec<Provider> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((providers, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<Provider> {
        let provider: Option<Provider> =
            sqlx::query_as("SELECT * FROM providers WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        provider.ok_or_else(|| BillingError::not_found(Entity::Provider, "Provider not found"))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        req: CreateProvider,
    ) -> BillingResult<Provider> {
        if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
            return Err(BillingError::validation(
                Entity::Provider,
                "Missing required provider fields",
            ));
        }
        principal.ensure_own_org(
            req.organization_id,
            Entity::Provider,
            "Cannot create providers outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        self.validator
            .validate(
                &mut tx,
                req.organization_id,
                &[ReferenceCheck::new(
                    Entity::Organization,
                    "organizationId",
                    req.organization_id,
                )],
            )
            .await?;

        if let Some(npi) = &req.npi {
            if scoped_value_taken(&mut tx, "providers", "npi", req.organization_id, npi, None)
                .await?
            {
                return Err(BillingError::duplicate(
                    Entity::Provider,
                    "Provider with this NPI already exists in this organization",
                ));
            }
        }

        let now = now_epoch();
        let provider: Provider = sqlx::query_as(
            r#"
            INSERT INTO providers (
                id, first_name, middle_name, last_name, npi, specialty,
                license_type, organization_id, source,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.first_name)
        .bind(&req.middle_name)
        .bind(&req.last_name)
        .bind(&req.npi)
        .bind(&req.specialty)
        .bind(req.license_type)
        .bind(req.organization_id)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Provider,
            "Provider with this NPI already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(provider)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateProvider,
    ) -> BillingResult<Provider> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Provider> =
            sqlx::query_as("SELECT * FROM providers WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = match existing {
            Some(p) if p.organization_id == principal.organization_id => p,
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Provider,
                    "Cannot update providers outside your organization or provider not found",
                ))
            }
        };

        if let Some(npi) = &req.npi {
            if existing.npi.as_deref() != Some(npi.as_str())
                && scoped_value_taken(
                    &mut tx,
                    "providers",
                    "npi",
                    existing.organization_id,
                    npi,
                    Some(id),
                )
                .await?
            {
                return Err(BillingError::duplicate(
                    Entity::Provider,
                    "Provider with this NPI already exists in this organization",
                ));
            }
        }

        let now = now_epoch();
        let provider: Provider = sqlx::query_as(
            r#"
            UPDATE providers
            SET
                first_name = COALESCE($2, first_name),
                middle_name = COALESCE($3, middle_name),
                last_name = COALESCE($4, last_name),
                npi = COALESCE($5, npi),
                specialty = COALESCE($6, specialty),
                license_type = COALESCE($7, license_type),
                source = COALESCE($8, source),
                updated_by = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.first_name)
        .bind(&req.middle_name)
        .bind(&req.last_name)
        .bind(&req.npi)
        .bind(&req.specialty)
        .bind(req.license_type)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Provider,
            "Provider with this NPI already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(provider)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Provider> =
            sqlx::query_as("SELECT * FROM providers WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(p) if p.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Provider,
                    "Cannot delete providers outside your organization or provider not found",
                ))
            }
        }

        let (visits, claims): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM visits WHERE provider_id = $1),
                (SELECT COUNT(*) FROM claims WHERE provider_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_dependents(
            Entity::Provider,
            "Provider has dependent records and cannot be deleted",
            &[("visits", visits), ("claims", claims)],
        )?;

        sqlx::query("DELETE FROM providers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_provider_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &ProviderListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (first_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR last_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR npi ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(specialty) = &params.specialty {
        query.push(" AND specialty ILIKE ");
        query.push_bind(format!("%{}%", specialty));
    }
    if let Some(license_type) = params.license_type {
        query.push(" AND license_type = ");
        query.push_bind(license_type);
    }
    if let Some(source) = params.source {
        query.push(" AND source = ");
        query.push_bind(source);
    }
}
