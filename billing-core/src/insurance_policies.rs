//! Standalone operations on a patient's insurance policies.
//!
//! Policies are owned by their patient; tenancy is derived through the
//! patient's organization. A policy outside the caller's organization is
//! indistinguishable from a missing one.

use crate::error::{BillingError, BillingResult};
use crate::models::PatientInsurance;
use crate::principal::Principal;
use crate::time::now_epoch;
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInsurancePolicy {
    pub is_primary: Option<bool>,
    pub subscriber_name: Option<String>,
    pub subscriber_dob: Option<i64>,
    pub member_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsurancePolicyListParams {
    pub patient_id: Option<Uuid>,
    pub payor_id: Option<Uuid>,
    pub is_primary: Option<bool>,
}

pub struct InsurancePolicyService {
    pool: DatabasePool,
}

impl InsurancePolicyService {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &InsurancePolicyListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<PatientInsurance>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new(
            "SELECT COUNT(*) FROM patient_insurances i \
             JOIN patients p ON p.id = i.patient_id",
        );
        push_policy_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new(
            "SELECT i.* FROM patient_insurances i \
             JOIN patients p ON p.id = i.patient_id",
        );
        push_policy_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY i.created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let policies: Vec<PatientInsurance> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((policies, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<PatientInsurance> {
        let policy: Option<PatientInsurance> = sqlx::query_as(
            "SELECT i.* FROM patient_insurances i \
             JOIN patients p ON p.id = i.patient_id \
             WHERE i.id = $1 AND p.organization_id = $2",
        )
        .bind(id)
        .bind(principal.organization_id)
        .fetch_optional(self.pool.pool())
        .await?;
        policy.ok_or_else(|| {
            BillingError::not_found(Entity::InsurancePolicy, "Insurance policy not found")
        })
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateInsurancePolicy,
    ) -> BillingResult<PatientInsurance> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<PatientInsurance> = sqlx::query_as(
            "SELECT i.* FROM patient_insurances i \
             JOIN patients p ON p.id = i.patient_id \
             WHERE i.id = $1 AND p.organization_id = $2 FOR UPDATE OF i",
        )
        .bind(id)
        .bind(principal.organization_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_none() {
            return Err(BillingError::not_found(
                Entity::InsurancePolicy,
                "Insurance policy not found",
            ));
        }

        let now = now_epoch();
        let policy: PatientInsurance = sqlx::query_as(
            r#"
            UPDATE patient_insurances
            SET
                is_primary = COALESCE($2, is_primary),
                subscriber_name = COALESCE($3, subscriber_name),
                subscriber_dob = COALESCE($4, subscriber_dob),
                member_id = COALESCE($5, member_id),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.is_primary)
        .bind(&req.subscriber_name)
        .bind(req.subscriber_dob)
        .bind(&req.member_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(policy)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<PatientInsurance> = sqlx::query_as(
            "SELECT i.* FROM patient_insurances i \
             JOIN patients p ON p.id = i.patient_id \
             WHERE i.id = $1 AND p.organization_id = $2 FOR UPDATE OF i",
        )
        .bind(id)
        .bind(principal.organization_id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_none() {
            return Err(BillingError::not_found(
                Entity::InsurancePolicy,
                "Insurance policy not found",
            ));
        }

        sqlx::query("DELETE FROM patient_insurances WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_policy_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &InsurancePolicyListParams,
) {
    query.push(" WHERE p.organization_id = ");
    query.push_bind(organization_id);

    if let Some(patient_id) = params.patient_id {
        query.push(" AND i.patient_id = ");
        query.push_bind(patient_id);
    }
    if let Some(payor_id) = params.payor_id {
        query.push(" AND i.plan_id IN (SELECT id FROM payor_plans WHERE payor_id = ");
        query.push_bind(payor_id);
        query.push(")");
    }
    if let Some(is_primary) = params.is_primary {
        query.push(" AND i.is_primary = ");
        query.push_bind(is_primary);
    }
}
