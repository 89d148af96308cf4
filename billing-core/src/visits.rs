//! Visit scheduling records. A visit ties a patient and a provider of the
//! same organization together and may later anchor claims.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{DataSource, Visit, VisitLocation, VisitStatus, VisitType};
use crate::principal::Principal;
use crate::time::now_epoch;
use database_layer::{DatabasePool, TransactionManager};
use error_common::Entity;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisit {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub organization_id: Uuid,
    pub visit_date: i64,
    pub visit_time: Option<i64>,
    pub duration: Option<i32>,
    pub visit_type: VisitType,
    pub location: Option<VisitLocation>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub source: DataSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisit {
    pub visit_date: Option<i64>,
    pub visit_time: Option<i64>,
    pub duration: Option<i32>,
    pub visit_type: Option<VisitType>,
    pub location: Option<VisitLocation>,
    pub status: Option<VisitStatus>,
    pub notes: Option<String>,
    pub source: Option<DataSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitListParams {
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    pub source: Option<DataSource>,
}

pub struct VisitService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl VisitService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &VisitListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<Visit>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM visits");
        push_visit_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM visits");
        push_visit_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let visits: Vec<Visit> = query.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok((visits, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<Visit> {
        let visit: Option<Visit> =
            sqlx::query_as("SELECT * FROM visits WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        visit.ok_or_else(|| BillingError::not_found(Entity::Visit, "Visit not found"))
    }

    pub async fn create(&self, principal: &Principal, req: CreateVisit) -> BillingResult<Visit> {
        principal.ensure_own_org(
            req.organization_id,
            Entity::Visit,
            "Cannot create visits outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        self.validator
            .validate(
                &mut tx,
                req.organization_id,
                &[
                    ReferenceCheck::new(Entity::Patient, "patientId", req.patient_id),
                    ReferenceCheck::new(Entity::Provider, "providerId", req.provider_id),
                ],
            )
            .await?;

        let now = now_epoch();
        let visit: Visit = sqlx::query_as(
            r#"
            INSERT INTO visits (
                id, patient_id, provider_id, organization_id, visit_date,
                visit_time, duration, visit_type, location, status, notes, source,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13, $14, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.patient_id)
        .bind(req.provider_id)
        .bind(req.organization_id)
        .bind(req.visit_date)
        .bind(req.visit_time)
        .bind(req.duration)
        .bind(req.visit_type)
        .bind(req.location)
        .bind(req.status)
        .bind(&req.notes)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(visit)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateVisit,
    ) -> BillingResult<Visit> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Visit> =
            sqlx::query_as("SELECT * FROM visits WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(v) if v.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Visit,
                    "Cannot update visits outside your organization or visit not found",
                ))
            }
        }

        let now = now_epoch();
        let visit: Visit = sqlx::query_as(
            r#"
            UPDATE visits
            SET
                visit_date = COALESCE($2, visit_date),
                visit_time = COALESCE($3, visit_time),
                duration = COALESCE($4, duration),
                visit_type = COALESCE($5, visit_type),
                location = COALESCE($6, location),
                status = COALESCE($7, status),
                notes = COALESCE($8, notes),
                source = COALESCE($9, source),
                updated_by = $10,
                updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.visit_date)
        .bind(req.visit_time)
        .bind(req.duration)
        .bind(req.visit_type)
        .bind(req.location)
        .bind(req.status)
        .bind(&req.notes)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        Ok(visit)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let existing: Option<Visit> =
            sqlx::query_as("SELECT * FROM visits WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(v) if v.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Visit,
                    "Cannot delete visits outside your organization or visit not found",
                ))
            }
        }

        let claims: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM claims WHERE visit_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        ensure_no_dependents(
            Entity::Visit,
            "Visit has dependent claims and cannot be deleted",
            &[("claims", claims)],
        )?;

        sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_visit_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &VisitListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        query.push(" AND notes ILIKE ");
        query.push_bind(format!("%{}%", search));
    }
    if let Some(patient_id) = params.patient_id {
        query.push(" AND patient_id = ");
        query.push_bind(patient_id);
    }
    if let Some(provider_id) = params.provider_id {
        query.push(" AND provider_id = ");
        query.push_bind(provider_id);
    }
    if let Some(status) = params.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(date_from) = params.date_from {
        query.push(" AND visit_date >= ");
        query.push_bind(date_from);
    }
    if let Some(date_to) = params.date_to {
        query.push(" AND visit_date <= ");
        query.push_bind(date_to);
    }
    if let Some(source) = params.source {
        query.push(" AND source = ");
        query.push_bind(source);
    }
}
