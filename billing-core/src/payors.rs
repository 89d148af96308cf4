//! Payor registry. A payor owns one or more plans; plans supplied on update
//! replace the existing set wholesale.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{Payor, PayorPlan, PlanType};
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{scoped_value_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::{Entity, FieldError};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub plan_name: String,
    pub plan_type: PlanType,
    pub is_in_network: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayor {
    pub name: String,
    pub external_payor_id: String,
    pub payor_category: String,
    pub billing_taxonomy: String,
    pub address: Option<serde_json::Value>,
    pub phone: Option<String>,
    pub portal_url: Option<String>,
    pub organization_id: Uuid,
    #[serde(default)]
    pub plans: Vec<PlanInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayor {
    pub name: Option<String>,
    pub external_payor_id: Option<String>,
    pub payor_category: Option<String>,
    pub billing_taxonomy: Option<String>,
    pub address: Option<serde_json::Value>,
    pub phone: Option<String>,
    pub portal_url: Option<String>,
    /// When supplied, replaces the payor's plans wholesale.
    pub plans: Option<Vec<PlanInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayorListParams {
    pub search: Option<String>,
    pub payor_category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayorWithPlans {
    #[serde(flatten)]
    pub payor: Payor,
    pub plans: Vec<PayorPlan>,
}

pub struct PayorService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl PayorService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &PayorListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<PayorWithPlans>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM payors");
        push_payor_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM payors");
        push_payor_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let payors: Vec<Payor> = query.build_query_as().fetch_all(&mut *tx).await?;

        let ids: Vec<Uuid> = payors.iter().map(|p| p.id).collect();
        let mut plans = load_plans(&mut tx, &ids).await?;
        tx.commit().await.map_err(BillingError::from)?;

        let rows = payors
            .into_iter()
            .map(|payor| {
                let id = payor.id;
                PayorWithPlans {
                    payor,
                    plans: plans.remove(&id).unwrap_or_default(),
                }
            })
            .collect();
        Ok((rows, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<PayorWithPlans> {
        let payor: Option<Payor> =
            sqlx::query_as("SELECT * FROM payors WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        let payor = payor.ok_or_else(|| BillingError::not_found(Entity::Payor, "Payor not found"))?;

        let plans: Vec<PayorPlan> =
            sqlx::query_as("SELECT * FROM payor_plans WHERE payor_id = $1 ORDER BY created_at")
                .bind(id)
                .fetch_all(self.pool.pool())
                .await?;
        Ok(PayorWithPlans { payor, plans })
    }

    pub async fn create(
        &self,
        principal: &Principal,
        req: CreatePayor,
    ) -> BillingResult<PayorWithPlans> {
        validate_payor(&req)?;
        principal.ensure_own_org(
            req.organization_id,
            Entity::Payor,
            "Cannot create payors outside your organization",
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

        if scoped_value_taken(
            &mut tx,
            "payors",
            "external_payor_id",
            req.organization_id,
            &req.external_payor_id,
            None,
        )
        .await?
        {
            return Err(BillingError::duplicate(
                Entity::Payor,
                "Payor with this externalPayorId already exists in this organization",
            ));
        }

        let now = now_epoch();
        let payor: Payor = sqlx::query_as(
            r#"
            INSERT INTO payors (
                id, name, external_payor_id, payor_category, billing_taxonomy,
                address, phone, portal_url, organization_id,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.external_payor_id)
        .bind(&req.payor_category)
        .bind(&req.billing_taxonomy)
        .bind(&req.address)
        .bind(&req.phone)
        .bind(&req.portal_url)
        .bind(req.organization_id)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Payor,
            "Payor with this externalPayorId already exists in this organization",
        ))?;

        let plans = insert_plans(&mut tx, payor.id, &req.plans, now).await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(PayorWithPlans { payor, plans })
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdatePayor,
    ) -> BillingResult<PayorWithPlans> {
        if let Some(plans) = &req.plans {
            let details = validate_plans(plans);
            if !details.is_empty() {
                return Err(BillingError::validation_with(
                    Entity::PayorPlan,
                    "Missing required plan fields",
                    details,
                ));
            }
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Payor> =
            sqlx::query_as("SELECT * FROM payors WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = match existing {
            Some(p) if p.organization_id == principal.organization_id => p,
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Payor,
                    "Cannot update payors outside your organization or payor not found",
                ))
            }
        };

        if let Some(external_id) = &req.external_payor_id {
            if *external_id != existing.external_payor_id
                && scoped_value_taken(
                    &mut tx,
                    "payors",
                    "external_payor_id",
                    existing.organization_id,
                    external_id,
                    Some(id),
                )
                .await?
            {
                return Err(BillingError::duplicate(
                    Entity::Payor,
                    "Payor with this externalPayorId already exists in this organization",
                ));
            }
        }

        let now = now_epoch();
        if let Some(plans) = &req.plans {
            sqlx::query("DELETE FROM payor_plans WHERE payor_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_plans(&mut tx, id, plans, now).await?;
        }

        let payor: Payor = sqlx::query_as(
            r#"
            UPDATE payors
            SET
                name = COALESCE($2, name),
                external_payor_id = COALESCE($3, external_payor_id),
                payor_category = COALESCE($4, payor_category),
                billing_taxonomy = COALESCE($5, billing_taxonomy),
                address = COALESCE($6, address),
                phone = COALESCE($7, phone),
                portal_url = COALESCE($8, portal_url),
                updated_by = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.external_payor_id)
        .bind(&req.payor_category)
        .bind(&req.billing_taxonomy)
        .bind(&req.address)
        .bind(&req.phone)
        .bind(&req.portal_url)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Payor,
            "Payor with this externalPayorId already exists in this organization",
        ))?;

        let plans: Vec<PayorPlan> =
            sqlx::query_as("SELECT * FROM payor_plans WHERE payor_id = $1 ORDER BY created_at")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(PayorWithPlans { payor, plans })
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Payor> =
            sqlx::query_as("SELECT * FROM payors WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(p) if p.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Payor,
                    "Cannot delete payors outside your organization or payor not found",
                ))
            }
        }

        let (plans, claims): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM payor_plans WHERE payor_id = $1),
                (SELECT COUNT(*) FROM claims WHERE payor_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_dependents(
            Entity::Payor,
            "Payor has dependent records and cannot be deleted",
            &[("plans", plans), ("claims", claims)],
        )?;

        sqlx::query("DELETE FROM payors WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn validate_payor(req: &CreatePayor) -> BillingResult<()> {
    if req.name.trim().is_empty()
        || req.external_payor_id.trim().is_empty()
        || req.payor_category.trim().is_empty()
        || req.billing_taxonomy.trim().is_empty()
        || req.plans.is_empty()
    {
        return Err(BillingError::validation(
            Entity::Payor,
            "Missing required payor fields or plans",
        ));
    }
    let details = validate_plans(&req.plans);
    if !details.is_empty() {
        return Err(BillingError::validation_with(
            Entity::PayorPlan,
            "Missing required plan fields",
            details,
        ));
    }
    Ok(())
}

fn validate_plans(plans: &[PlanInput]) -> Vec<FieldError> {
    let mut details = Vec::new();
    for (i, plan) in plans.iter().enumerate() {
        if plan.plan_name.trim().is_empty() {
            details.push(FieldError::new(
                format!("plans[{}].planName", i),
                "required",
            ));
        }
    }
    details
}

fn push_payor_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &PayorListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR external_payor_id ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(category) = &params.payor_category {
        query.push(" AND payor_category ILIKE ");
        query.push_bind(format!("%{}%", category));
    }
}

async fn insert_plans(
    tx: &mut Transaction<'_, Postgres>,
    payor_id: Uuid,
    plans: &[PlanInput],
    now: i64,
) -> BillingResult<Vec<PayorPlan>> {
    let mut rows = Vec::with_capacity(plans.len());
    for plan in plans {
        let row: PayorPlan = sqlx::query_as(
            r#"
            INSERT INTO payor_plans (
                id, payor_id, plan_name, plan_type, is_in_network, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payor_id)
        .bind(&plan.plan_name)
        .bind(plan.plan_type)
        .bind(plan.is_in_network)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

async fn load_plans(
    tx: &mut Transaction<'_, Postgres>,
    payor_ids: &[Uuid],
) -> BillingResult<HashMap<Uuid, Vec<PayorPlan>>> {
    let rows: Vec<PayorPlan> = sqlx::query_as(
        "SELECT * FROM payor_plans WHERE payor_id = ANY($1) ORDER BY created_at",
    )
    .bind(payor_ids)
    .fetch_all(&mut **tx)
    .await?;
    let mut grouped: HashMap<Uuid, Vec<PayorPlan>> = HashMap::new();
    for row in rows {
        grouped.entry(row.payor_id).or_default().push(row);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(name: &str) -> PlanInput {
        PlanInput {
            plan_name: name.into(),
            plan_type: PlanType::PPO,
            is_in_network: true,
        }
    }

    fn payor(plans: Vec<PlanInput>) -> CreatePayor {
        CreatePayor {
            name: "Blue Cross Blue Shield".into(),
            external_payor_id: "BCBS-CA-001".into(),
            payor_category: "Commercial".into(),
            billing_taxonomy: "3336C0003X".into(),
            address: None,
            phone: None,
            portal_url: None,
            organization_id: Uuid::new_v4(),
            plans,
        }
    }

    #[test]
    fn payor_requires_at_least_one_plan() {
        let err = validate_payor(&payor(vec![])).unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));
        assert!(validate_payor(&payor(vec![plan("PPO Gold")])).is_ok());
    }

    #[test]
    fn unnamed_plans_are_reported_by_index() {
        let details = validate_plans(&[plan("PPO Gold"), plan("  ")]);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field, "plans[1].planName");
    }
}
