//! Claim lifecycle management.
//!
//! A claim, its service lines and its timeline move together: creation
//! writes all three in one transaction, and every status change appends
//! exactly one timeline entry atomically with the mutation. The timeline is
//! append-only; nothing here ever updates or deletes an entry.

use crate::error::{BillingError, BillingResult};
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{Claim, ClaimService, ClaimStatus, ClaimTimelineEntry, DataSource};
use crate::principal::Principal;
use crate::time::now_epoch;
use crate::unique::{scoped_value_taken, unique_violation};
use database_layer::{DatabasePool, TransactionManager};
use error_common::{Entity, FieldError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimServiceInput {
    pub cpt_code_id: Uuid,
    pub description: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClaim {
    pub claim_number: String,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub payor_id: Uuid,
    pub organization_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub service_date: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub billed_amount: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub paid_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub notes: Option<String>,
    pub source: DataSource,
    pub submission_date: Option<i64>,
    #[serde(default)]
    pub services: Vec<ClaimServiceInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaim {
    pub service_date: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub billed_amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub paid_amount: Option<Decimal>,
    pub status: Option<ClaimStatus>,
    pub notes: Option<String>,
    pub source: Option<DataSource>,
    pub submission_date: Option<i64>,
    /// When supplied, the existing service lines are replaced wholesale;
    /// callers must resend the complete set.
    pub services: Option<Vec<ClaimServiceInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClaimStatus {
    pub status: Option<ClaimStatus>,
    pub notes: Option<String>,
    /// Optional caller-supplied action label for the timeline entry.
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimListParams {
    pub search: Option<String>,
    pub patient_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub payor_id: Option<Uuid>,
    pub status: Option<ClaimStatus>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount_min: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub amount_max: Option<Decimal>,
    pub source: Option<DataSource>,
    pub include_services: Option<bool>,
    pub include_timeline: Option<bool>,
}

/// A claim with optionally embedded children.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimWithChildren {
    #[serde(flatten)]
    pub claim: Claim,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ClaimService>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<ClaimTimelineEntry>>,
}

pub struct ClaimLifecycle {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl ClaimLifecycle {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &ClaimListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<ClaimWithChildren>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM claims");
        push_claim_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM claims");
        push_claim_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let claims: Vec<Claim> = query.build_query_as().fetch_all(&mut *tx).await?;

        let ids: Vec<Uuid> = claims.iter().map(|c| c.id).collect();
        let mut services = if params.include_services.unwrap_or(false) {
            Some(load_services(&mut tx, &ids).await?)
        } else {
            None
        };
        let mut timeline = if params.include_timeline.unwrap_or(false) {
            Some(load_timeline(&mut tx, &ids).await?)
        } else {
            None
        };
        tx.commit().await.map_err(BillingError::from)?;

        let rows = claims
            .into_iter()
            .map(|claim| {
                let id = claim.id;
                ClaimWithChildren {
                    claim,
                    services: services
                        .as_mut()
                        .map(|m| m.remove(&id).unwrap_or_default()),
                    timeline: timeline
                        .as_mut()
                        .map(|m| m.remove(&id).unwrap_or_default()),
                }
            })
            .collect();
        Ok((rows, total))
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> BillingResult<ClaimWithChildren> {
        let claim: Option<Claim> =
            sqlx::query_as("SELECT * FROM claims WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        let claim =
            claim.ok_or_else(|| BillingError::not_found(Entity::Claim, "Claim not found"))?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let children = load_children(&mut tx, claim.id).await?;
        tx.commit().await.map_err(BillingError::from)?;

        Ok(ClaimWithChildren {
            claim,
            services: Some(children.0),
            timeline: Some(children.1),
        })
    }

    /// Create a claim, its service lines and the initial "Created" timeline
    /// entry as one atomic unit.
    pub async fn create(
        &self,
        principal: &Principal,
        req: CreateClaim,
    ) -> BillingResult<ClaimWithChildren> {
        validate_new_claim(&req)?;
        principal.ensure_own_org(
            req.organization_id,
            Entity::Claim,
            "Cannot create claims outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        if scoped_value_taken(
            &mut tx,
            "claims",
            "claim_number",
            req.organization_id,
            &req.claim_number,
            None,
        )
        .await?
        {
            return Err(BillingError::duplicate(
                Entity::Claim,
                "Claim with this number already exists in this organization",
            ));
        }

        let mut checks = vec![
            ReferenceCheck::new(Entity::Patient, "patientId", req.patient_id),
            ReferenceCheck::new(Entity::Provider, "providerId", req.provider_id),
            ReferenceCheck::new(Entity::Payor, "payorId", req.payor_id),
        ];
        if let Some(visit_id) = req.visit_id {
            checks.push(ReferenceCheck::new(Entity::Visit, "visitId", visit_id));
        }
        for service in &req.services {
            checks.push(ReferenceCheck::new(
                Entity::CptCode,
                "services.cptCodeId",
                service.cpt_code_id,
            ));
        }
        self.validator
            .validate(&mut tx, req.organization_id, &checks)
            .await?;

        let now = now_epoch();
        let claim: Claim = sqlx::query_as(
            r#"
            INSERT INTO claims (
                id, claim_number, visit_id, patient_id, provider_id, payor_id,
                organization_id, service_date, billed_amount, paid_amount,
                status, submission_date, notes, source,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15, $16, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.claim_number)
        .bind(req.visit_id)
        .bind(req.patient_id)
        .bind(req.provider_id)
        .bind(req.payor_id)
        .bind(req.organization_id)
        .bind(req.service_date)
        .bind(req.billed_amount)
        .bind(req.paid_amount.unwrap_or(Decimal::ZERO))
        .bind(req.status)
        .bind(req.submission_date)
        .bind(&req.notes)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation(
            Entity::Claim,
            "Claim with this number already exists in this organization",
        ))?;

        let services = insert_services(&mut tx, claim.id, &req.services, now).await?;
        let entry = append_timeline(
            &mut tx,
            claim.id,
            "Created",
            claim.status,
            format!("Claim created with status: {}", claim.status),
            Some(principal.user_id),
            now,
        )
        .await?;

        tx.commit().await.map_err(BillingError::from)?;
        info!(claim_id = %claim.id, claim_number = %claim.claim_number, "claim created");

        Ok(ClaimWithChildren {
            claim,
            services: Some(services),
            timeline: Some(vec![entry]),
        })
    }

    /// Replace scalar fields; when `services` is supplied the existing line
    /// items are deleted and recreated. A status change appends a timeline
    /// entry in the same transaction.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateClaim,
    ) -> BillingResult<ClaimWithChildren> {
        if let Some(services) = &req.services {
            if services.is_empty() {
                return Err(BillingError::validation(
                    Entity::Claim,
                    "A claim must keep at least one service line",
                ));
            }
            let details = validate_service_lines(services);
            if !details.is_empty() {
                return Err(BillingError::validation_with(
                    Entity::Claim,
                    "Invalid claim service lines",
                    details,
                ));
            }
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let existing = lock_claim(&mut tx, id).await?;
        let existing = authorize_claim(existing, principal, "update")?;

        let now = now_epoch();
        if let Some(services) = &req.services {
            let mut checks = Vec::with_capacity(services.len());
            for service in services {
                checks.push(ReferenceCheck::new(
                    Entity::CptCode,
                    "services.cptCodeId",
                    service.cpt_code_id,
                ));
            }
            self.validator
                .validate(&mut tx, existing.organization_id, &checks)
                .await?;

            sqlx::query("DELETE FROM claim_services WHERE claim_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_services(&mut tx, id, services, now).await?;
        }

        let claim: Claim = sqlx::query_as(
            r#"
            UPDATE claims
            SET
                service_date = COALESCE($2, service_date),
                billed_amount = COALESCE($3, billed_amount),
                paid_amount = COALESCE($4, paid_amount),
                status = COALESCE($5, status),
                notes = COALESCE($6, notes),
                source = COALESCE($7, source),
                submission_date = COALESCE($8, submission_date),
                updated_by = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.service_date)
        .bind(req.billed_amount)
        .bind(req.paid_amount)
        .bind(req.status)
        .bind(&req.notes)
        .bind(req.source)
        .bind(req.submission_date)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(status) = req.status {
            if status != existing.status {
                append_timeline(
                    &mut tx,
                    id,
                    "Status Updated",
                    status,
                    format!("Status updated to: {}", status),
                    Some(principal.user_id),
                    now,
                )
                .await?;
            }
        }

        let children = load_children(&mut tx, id).await?;
        tx.commit().await.map_err(BillingError::from)?;

        Ok(ClaimWithChildren {
            claim,
            services: Some(children.0),
            timeline: Some(children.1),
        })
    }

    /// Dedicated status transition: always appends exactly one timeline
    /// entry, even when the note is omitted or the status is unchanged.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdateClaimStatus,
    ) -> BillingResult<ClaimWithChildren> {
        let status = req
            .status
            .ok_or_else(|| BillingError::validation(Entity::Claim, "Status is required"))?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let existing = lock_claim(&mut tx, id).await?;
        authorize_claim(existing, principal, "update")?;

        let now = now_epoch();
        let claim: Claim = sqlx::query_as(
            "UPDATE claims SET status = $2, updated_by = $3, updated_at = $4 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let action = req.action.unwrap_or_else(|| "Status Updated".to_string());
        let notes = req
            .notes
            .unwrap_or_else(|| format!("Status updated to: {}", status));
        append_timeline(
            &mut tx,
            id,
            &action,
            status,
            notes,
            Some(principal.user_id),
            now,
        )
        .await?;

        let children = load_children(&mut tx, id).await?;
        tx.commit().await.map_err(BillingError::from)?;
        info!(claim_id = %id, status = %status, "claim status updated");

        Ok(ClaimWithChildren {
            claim,
            services: Some(children.0),
            timeline: Some(children.1),
        })
    }

    /// Deleting a claim removes its service lines and timeline with it;
    /// nothing above a claim depends on it.
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let existing = lock_claim(&mut tx, id).await?;
        authorize_claim(existing, principal, "delete")?;

        sqlx::query("DELETE FROM claims WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        info!(claim_id = %id, "claim deleted");
        Ok(())
    }
}

fn push_claim_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &ClaimListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (claim_number ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR notes ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(patient_id) = params.patient_id {
        query.push(" AND patient_id = ");
        query.push_bind(patient_id);
    }
    if let Some(provider_id) = params.provider_id {
        query.push(" AND provider_id = ");
        query.push_bind(provider_id);
    }
    if let Some(payor_id) = params.payor_id {
        query.push(" AND payor_id = ");
        query.push_bind(payor_id);
    }
    if let Some(status) = params.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(date_from) = params.date_from {
        query.push(" AND service_date >= ");
        query.push_bind(date_from);
    }
    if let Some(date_to) = params.date_to {
        query.push(" AND service_date <= ");
        query.push_bind(date_to);
    }
    if let Some(amount_min) = params.amount_min {
        query.push(" AND billed_amount >= ");
        query.push_bind(amount_min);
    }
    if let Some(amount_max) = params.amount_max {
        query.push(" AND billed_amount <= ");
        query.push_bind(amount_max);
    }
    if let Some(source) = params.source {
        query.push(" AND source = ");
        query.push_bind(source);
    }
}

/// Lock the claim row for the duration of the transaction so concurrent
/// mutations of the same claim serialize.
async fn lock_claim(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> BillingResult<Option<Claim>> {
    let claim = sqlx::query_as("SELECT * FROM claims WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(claim)
}

/// A claim that is absent or belongs to a foreign organization fails
/// identically, masking existence across tenants.
fn authorize_claim(
    claim: Option<Claim>,
    principal: &Principal,
    action: &str,
) -> BillingResult<Claim> {
    match claim {
        Some(claim) if claim.organization_id == principal.organization_id => Ok(claim),
        _ => Err(BillingError::forbidden(
            Entity::Claim,
            format!(
                "Cannot {} claims outside your organization or claim not found",
                action
            ),
        )),
    }
}

fn validate_new_claim(req: &CreateClaim) -> BillingResult<()> {
    let mut details = Vec::new();
    if req.claim_number.trim().is_empty() {
        details.push(FieldError::new("claimNumber", "required"));
    }
    if req.billed_amount < Decimal::ZERO {
        details.push(FieldError::new("billedAmount", "must not be negative"));
    }
    if let Some(paid) = req.paid_amount {
        if paid < Decimal::ZERO {
            details.push(FieldError::new("paidAmount", "must not be negative"));
        }
    }
    if req.services.is_empty() {
        details.push(FieldError::new(
            "services",
            "at least one service line is required",
        ));
    }
    details.extend(validate_service_lines(&req.services));

    if details.is_empty() {
        Ok(())
    } else {
        Err(BillingError::validation_with(
            Entity::Claim,
            "Missing required claim fields or services",
            details,
        ))
    }
}

fn validate_service_lines(services: &[ClaimServiceInput]) -> Vec<FieldError> {
    let mut details = Vec::new();
    for (i, line) in services.iter().enumerate() {
        if line.quantity < 1 {
            details.push(FieldError::new(
                format!("services[{}].quantity", i),
                "must be at least 1",
            ));
        }
        if line.unit_price < Decimal::ZERO {
            details.push(FieldError::new(
                format!("services[{}].unitPrice", i),
                "must not be negative",
            ));
        }
        if Decimal::from(line.quantity) * line.unit_price != line.total_price {
            details.push(FieldError::new(
                format!("services[{}].totalPrice", i),
                "must equal quantity * unitPrice",
            ));
        }
    }
    details
}

async fn insert_services(
    tx: &mut Transaction<'_, Postgres>,
    claim_id: Uuid,
    services: &[ClaimServiceInput],
    now: i64,
) -> BillingResult<Vec<ClaimService>> {
    let mut rows = Vec::with_capacity(services.len());
    for line in services {
        let row: ClaimService = sqlx::query_as(
            r#"
            INSERT INTO claim_services (
                id, claim_id, cpt_code_id, description, quantity,
                unit_price, total_price, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(claim_id)
        .bind(line.cpt_code_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.total_price)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

async fn append_timeline(
    tx: &mut Transaction<'_, Postgres>,
    claim_id: Uuid,
    action: &str,
    status: ClaimStatus,
    notes: String,
    user_id: Option<Uuid>,
    now: i64,
) -> BillingResult<ClaimTimelineEntry> {
    let entry = sqlx::query_as(
        r#"
        INSERT INTO claim_timeline (id, claim_id, action, status, notes, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(claim_id)
    .bind(action)
    .bind(status)
    .bind(notes)
    .bind(user_id)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(entry)
}

async fn load_children(
    tx: &mut Transaction<'_, Postgres>,
    claim_id: Uuid,
) -> BillingResult<(Vec<ClaimService>, Vec<ClaimTimelineEntry>)> {
    let services: Vec<ClaimService> = sqlx::query_as(
        "SELECT * FROM claim_services WHERE claim_id = $1 ORDER BY created_at",
    )
    .bind(claim_id)
    .fetch_all(&mut **tx)
    .await?;
    let timeline: Vec<ClaimTimelineEntry> = sqlx::query_as(
        "SELECT * FROM claim_timeline WHERE claim_id = $1 ORDER BY created_at",
    )
    .bind(claim_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok((services, timeline))
}

async fn load_services(
    tx: &mut Transaction<'_, Postgres>,
    claim_ids: &[Uuid],
) -> BillingResult<HashMap<Uuid, Vec<ClaimService>>> {
    let rows: Vec<ClaimService> = sqlx::query_as(
        "SELECT * FROM claim_services WHERE claim_id = ANY($1) ORDER BY created_at",
    )
    .bind(claim_ids)
    .fetch_all(&mut **tx)
    .await?;
    let mut grouped: HashMap<Uuid, Vec<ClaimService>> = HashMap::new();
    for row in rows {
        grouped.entry(row.claim_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn load_timeline(
    tx: &mut Transaction<'_, Postgres>,
    claim_ids: &[Uuid],
) -> BillingResult<HashMap<Uuid, Vec<ClaimTimelineEntry>>> {
    let rows: Vec<ClaimTimelineEntry> = sqlx::query_as(
        "SELECT * FROM claim_timeline WHERE claim_id = ANY($1) ORDER BY created_at",
    )
    .bind(claim_ids)
    .fetch_all(&mut **tx)
    .await?;
    let mut grouped: HashMap<Uuid, Vec<ClaimTimelineEntry>> = HashMap::new();
    for row in rows {
        grouped.entry(row.claim_id).or_default().push(row);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(quantity: i32, unit: &str, total: &str) -> ClaimServiceInput {
        ClaimServiceInput {
            cpt_code_id: Uuid::new_v4(),
            description: None,
            quantity,
            unit_price: unit.parse().unwrap(),
            total_price: total.parse().unwrap(),
        }
    }

    fn valid_create() -> CreateClaim {
        CreateClaim {
            claim_number: "CLM-1".into(),
            patient_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            payor_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            visit_id: None,
            service_date: 1_700_000_000,
            billed_amount: "150.00".parse().unwrap(),
            paid_amount: None,
            status: ClaimStatus::Pending,
            notes: None,
            source: DataSource::Native,
            submission_date: None,
            services: vec![service(1, "150.00", "150.00")],
        }
    }

    #[test]
    fn accepts_a_consistent_claim() {
        assert!(validate_new_claim(&valid_create()).is_ok());
    }

    #[test]
    fn rejects_claim_without_services() {
        let mut req = valid_create();
        req.services.clear();
        let err = validate_new_claim(&req).unwrap_err();
        assert!(matches!(err, BillingError::Validation { .. }));
    }

    #[test]
    fn rejects_line_total_that_disagrees_with_unit_math() {
        let mut req = valid_create();
        req.services = vec![service(2, "150.00", "150.00")];
        let err = validate_new_claim(&req).unwrap_err();
        let detail_fields: Vec<_> = err.details().iter().map(|d| d.field.clone()).collect();
        assert_eq!(detail_fields, vec!["services[0].totalPrice"]);
    }

    #[test]
    fn rejects_negative_amounts_and_zero_quantity() {
        let mut req = valid_create();
        req.billed_amount = "-1".parse().unwrap();
        req.services = vec![service(0, "10.00", "0.00")];
        let err = validate_new_claim(&req).unwrap_err();
        let fields: Vec<_> = err.details().iter().map(|d| d.field.clone()).collect();
        assert!(fields.contains(&"billedAmount".to_string()));
        assert!(fields.contains(&"services[0].quantity".to_string()));
    }

    #[test]
    fn missing_or_foreign_claim_is_masked_as_forbidden() {
        let principal = Principal::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            crate::models::UserRole::Biller,
        );
        let err = authorize_claim(None, &principal, "update").unwrap_err();
        assert!(matches!(err, BillingError::Forbidden { .. }));
    }

    #[test]
    fn status_change_note_is_synthesized() {
        let note = format!("Status updated to: {}", ClaimStatus::UnderReview);
        assert_eq!(note, "Status updated to: UnderReview");
    }
}
