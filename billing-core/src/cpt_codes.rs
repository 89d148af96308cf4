//! CPT code catalog: coded, priced procedure types, unique per organization.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::models::CptCode;
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{scoped_value_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCptCode {
    pub code: String,
    pub description: String,
    pub specialty: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub organization_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCptCode {
    pub code: Option<String>,
    pub description: Option<String>,
    pub specialty: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub base_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CptCodeListParams {
    pub search: Option<String>,
    pub specialty: Option<String>,
}

pub struct CptCodeService {
    pool: DatabasePool,
}

impl CptCodeService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &CptCodeListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<CptCode>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM cpt_codes");
        push_cpt_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM cpt_codes");
        push_cpt_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let codes: Vec<CptCode> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((codes, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<CptCode> {
        let code: Option<CptCode> =
            sqlx::query_as("SELECT * FROM cpt_codes WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        code.ok_or_else(|| BillingError::not_found(Entity::CptCode, "CPT code not found"))
    }

    pub async fn create(&self, principal: &Principal, req: CreateCptCode) -> BillingResult<CptCode> {
        if req.code.trim().is_empty() || req.description.trim().is_empty() {
            return Err(BillingError::validation(
                Entity::CptCode,
                "Missing required CPT code fields",
            ));
        }
        if req.base_price < Decimal::ZERO {
            return Err(BillingError::validation(
                Entity::CptCode,
                "Base price must be positive",
            ));
        }
        principal.ensure_own_org(
            req.organization_id,
            Entity::CptCode,
            "Cannot create CPT codes outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        if scoped_value_taken(
            &mut tx,
            "cpt_codes",
            "code",
            req.organization_id,
            &req.code,
            None,
        )
        .await?
        {
            return Err(BillingError::duplicate(
                Entity::CptCode,
                "CPT code already exists in this organization",
            ));
        }

        let now = now_epoch();
        let code: CptCode = sqlx::query_as(
            r#"
            INSERT INTO cpt_codes (
                id, code, description, specialty, base_price, organization_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.code)
        .bind(&req.description)
        .bind(&req.specialty)
        .bind(req.base_price)
        .bind(req.organization_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::CptCode,
            "CPT code already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(code)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateCptCode,
    ) -> BillingResult<CptCode> {
        if let Some(base_price) = req.base_price {
            if base_price < Decimal::ZERO {
                return Err(BillingError::validation(
                    Entity::CptCode,
                    "Base price must be positive",
                ));
            }
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<CptCode> =
            sqlx::query_as("SELECT * FROM cpt_codes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = match existing {
            Some(c) if c.organization_id == principal.organization_id => c,
            _ => {
                return Err(BillingError::forbidden(
                    Entity::CptCode,
                    "Cannot update CPT codes outside your organization or code not found",
                ))
            }
        };

        if let Some(code) = &req.code {
            if *code != existing.code
                && scoped_value_taken(
                    &mut tx,
                    "cpt_codes",
                    "code",
                    existing.organization_id,
                    code,
                    Some(id),
                )
                .await?
            {
                return Err(BillingError::duplicate(
                    Entity::CptCode,
                    "CPT code already exists in this organization",
                ));
            }
        }

        let now = now_epoch();
        let code: CptCode = sqlx::query_as(
            r#"
            UPDATE cpt_codes
            SET
                code = COALESCE($2, code),
                description = COALESCE($3, description),
                specialty = COALESCE($4, specialty),
                base_price = COALESCE($5, base_price),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.code)
        .bind(&req.description)
        .bind(&req.specialty)
        .bind(req.base_price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::CptCode,
            "CPT code already exists in this organization",
        ))?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(code)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<CptCode> =
            sqlx::query_as("SELECT * FROM cpt_codes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(c) if c.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::CptCode,
                    "Cannot delete CPT codes outside your organization or code not found",
                ))
            }
        }

        let services: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM claim_services WHERE cpt_code_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        ensure_no_dependents(
            Entity::CptCode,
            "CPT code is used in claim services and cannot be deleted",
            &[("claim services", services)],
        )?;

        sqlx::query("DELETE FROM cpt_codes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_cpt_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &CptCodeListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (code ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(specialty) = &params.specialty {
        query.push(" AND specialty ILIKE ");
        query.push_bind(format!("%{}%", specialty));
    }
}
