//! Patient registry: demographics plus insurance coverage.
//!
//! SSNs never leave this module unmasked. Insurance policies are owned by
//! the patient; supplying a new set on update replaces the existing rows.

use crate::error::{BillingError, BillingResult};
use crate::guard::ensure_no_dependents;
use crate::integrity::{ReferenceCheck, ReferenceValidator};
use crate::models::{DataSource, InsuredType, Patient, PatientInsurance};
use crate::principal::Principal;
use crate::time::now_epoch;
use database_layer::{DatabasePool, TransactionManager};
use error_common::{Entity, FieldError};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceInput {
    pub plan_id: Uuid,
    pub is_primary: bool,
    pub insured_type: InsuredType,
    pub subscriber_name: Option<String>,
    pub subscriber_dob: Option<i64>,
    pub member_id: String,
    pub insurance_card: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatient {
    pub prefix: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub date_of_birth: i64,
    pub gender: Option<String>,
    pub ssn: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<serde_json::Value>,
    pub organization_id: Uuid,
    pub source: DataSource,
    #[serde(default)]
    pub insurances: Vec<InsuranceInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatient {
    pub prefix: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub suffix: Option<String>,
    pub date_of_birth: Option<i64>,
    pub gender: Option<String>,
    pub ssn: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<serde_json::Value>,
    pub source: Option<DataSource>,
    /// When supplied, replaces the patient's insurance policies wholesale.
    pub insurances: Option<Vec<InsuranceInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientListParams {
    pub search: Option<String>,
    pub source: Option<DataSource>,
    pub include_insurances: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientWithInsurance {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_policies: Option<Vec<PatientInsurance>>,
}

pub struct PatientService {
    pool: DatabasePool,
    validator: ReferenceValidator,
}

impl PatientService {
    pub fn new(pool: DatabasePool, validator: ReferenceValidator) -> Self {
        Self { pool, validator }
    }

    fn manager(&self, principal: &Principal) -> TransactionManager {
        TransactionManager::new(self.pool.clone()).with_scope(principal.scope())
    }

    pub async fn list(
        &self,
        principal: &Principal,
        params: &PatientListParams,
        limit: i64,
        offset: i64,
    ) -> BillingResult<(Vec<PatientWithInsurance>, i64)> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM patients");
        push_patient_filters(&mut count_query, principal.organization_id, params);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await?;

        let mut query = QueryBuilder::new("SELECT * FROM patients");
        push_patient_filters(&mut query, principal.organization_id, params);
        query.push(" ORDER BY created_at DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let mut patients: Vec<Patient> = query.build_query_as().fetch_all(&mut *tx).await?;

        let mut policies = if params.include_insurances.unwrap_or(false) {
            let ids: Vec<Uuid> = patients.iter().map(|p| p.id).collect();
            Some(load_policies(&mut tx, &ids).await?)
        } else {
            None
        };
        tx.commit().await.map_err(BillingError::from)?;

        let rows = patients
            .drain(..)
            .map(|mut patient| {
                mask_ssn(&mut patient);
                let id = patient.id;
                PatientWithInsurance {
                    patient,
                    insurance_policies: policies
                        .as_mut()
                        .map(|m| m.remove(&id).unwrap_or_default()),
                }
            })
            .collect();
        Ok((rows, total))
    }

    pub async fn get(
        &self,
        principal: &Principal,
        id: Uuid,
        include_insurances: bool,
    ) -> BillingResult<PatientWithInsurance> {
        let patient: Option<Patient> =
            sqlx::query_as("SELECT * FROM patients WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(principal.organization_id)
                .fetch_optional(self.pool.pool())
                .await?;
        let mut patient =
            patient.ok_or_else(|| BillingError::not_found(Entity::Patient, "Patient not found"))?;
        mask_ssn(&mut patient);

        let insurance_policies = if include_insurances {
            Some(load_policies_for(self.pool.pool(), id).await?)
        } else {
            None
        };
        Ok(PatientWithInsurance {
            patient,
            insurance_policies,
        })
    }

    pub async fn create(
        &self,
        principal: &Principal,
        req: CreatePatient,
    ) -> BillingResult<PatientWithInsurance> {
        if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
            return Err(BillingError::validation(
                Entity::Patient,
                "Missing required patient fields",
            ));
        }
        validate_insurances(&req.insurances)?;
        principal.ensure_own_org(
            req.organization_id,
            Entity::Patient,
            "Cannot create patients outside your organization",
        )?;

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;

        let mut checks = vec![ReferenceCheck::new(
            Entity::Organization,
            "organizationId",
            req.organization_id,
        )];
        for ins in &req.insurances {
            checks.push(ReferenceCheck::new(
                Entity::PayorPlan,
                "insurances.planId",
                ins.plan_id,
            ));
        }
        self.validator
            .validate(&mut tx, req.organization_id, &checks)
            .await?;

        let now = now_epoch();
        let mut patient: Patient = sqlx::query_as(
            r#"
            INSERT INTO patients (
                id, prefix, first_name, middle_name, last_name, suffix,
                date_of_birth, gender, ssn, phone, email, address,
                organization_id, source, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15, $16, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.prefix)
        .bind(&req.first_name)
        .bind(&req.middle_name)
        .bind(&req.last_name)
        .bind(&req.suffix)
        .bind(req.date_of_birth)
        .bind(&req.gender)
        .bind(&req.ssn)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(req.organization_id)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let policies = insert_policies(&mut tx, patient.id, &req.insurances, now).await?;
        tx.commit().await.map_err(BillingError::from)?;

        mask_ssn(&mut patient);
        Ok(PatientWithInsurance {
            patient,
            insurance_policies: Some(policies),
        })
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: UpdatePatient,
    ) -> BillingResult<PatientWithInsurance> {
        if let Some(insurances) = &req.insurances {
            validate_insurances(insurances)?;
        }

        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let existing: Option<Patient> =
            sqlx::query_as("SELECT * FROM patients WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let existing = match existing {
            Some(p) if p.organization_id == principal.organization_id => p,
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Patient,
                    "Cannot update patients outside your organization or patient not found",
                ))
            }
        };

        let now = now_epoch();
        if let Some(insurances) = &req.insurances {
            let checks: Vec<ReferenceCheck> = insurances
                .iter()
                .map(|ins| ReferenceCheck::new(Entity::PayorPlan, "insurances.planId", ins.plan_id))
                .collect();
            self.validator
                .validate(&mut tx, existing.organization_id, &checks)
                .await?;

            sqlx::query("DELETE FROM patient_insurances WHERE patient_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_policies(&mut tx, id, insurances, now).await?;
        }

        let mut patient: Patient = sqlx::query_as(
            r#"
            UPDATE patients
            SET
                prefix = COALESCE($2, prefix),
                first_name = COALESCE($3, first_name),
                middle_name = COALESCE($4, middle_name),
                last_name = COALESCE($5, last_name),
                suffix = COALESCE($6, suffix),
                date_of_birth = COALESCE($7, date_of_birth),
                gender = COALESCE($8, gender),
                ssn = COALESCE($9, ssn),
                phone = COALESCE($10, phone),
                email = COALESCE($11, email),
                address = COALESCE($12, address),
                source = COALESCE($13, source),
                updated_by = $14,
                updated_at = $15
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.prefix)
        .bind(&req.first_name)
        .bind(&req.middle_name)
        .bind(&req.last_name)
        .bind(&req.suffix)
        .bind(req.date_of_birth)
        .bind(&req.gender)
        .bind(&req.ssn)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.address)
        .bind(req.source)
        .bind(principal.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let policies = load_policies_for(&mut *tx, id).await?;
        tx.commit().await.map_err(BillingError::from)?;

        mask_ssn(&mut patient);
        Ok(PatientWithInsurance {
            patient,
            insurance_policies: Some(policies),
        })
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> BillingResult<()> {
        let manager = self.manager(principal);
        let mut tx = manager.begin().await?;
        let existing: Option<Patient> =
            sqlx::query_as("SELECT * FROM patients WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(p) if p.organization_id == principal.organization_id => {}
            _ => {
                return Err(BillingError::forbidden(
                    Entity::Patient,
                    "Cannot delete patients outside your organization or patient not found",
                ))
            }
        }

        let (visits, claims, policies): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM visits WHERE patient_id = $1),
                (SELECT COUNT(*) FROM claims WHERE patient_id = $1),
                (SELECT COUNT(*) FROM patient_insurances WHERE patient_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        ensure_no_dependents(
            Entity::Patient,
            "Patient has dependent records and cannot be deleted",
            &[
                ("visits", visits),
                ("claims", claims),
                ("insurance policies", policies),
            ],
        )?;

        sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(BillingError::from)?;
        Ok(())
    }
}

fn push_patient_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    organization_id: Uuid,
    params: &PatientListParams,
) {
    query.push(" WHERE organization_id = ");
    query.push_bind(organization_id);

    if let Some(search) = &params.search {
        let pattern = format!("%{}%", search);
        query.push(" AND (first_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR last_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR email ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR phone ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(source) = params.source {
        query.push(" AND source = ");
        query.push_bind(source);
    }
}

/// Replace the SSN with its masked form before it can leave the core.
fn mask_ssn(patient: &mut Patient) {
    if let Some(ssn) = &patient.ssn {
        let digits: Vec<char> = ssn.chars().collect();
        let last4: String = digits
            .iter()
            .skip(digits.len().saturating_sub(4))
            .collect();
        patient.ssn = Some(format!("***-**-{}", last4));
    }
}

fn validate_insurances(insurances: &[InsuranceInput]) -> BillingResult<()> {
    let mut details = Vec::new();
    for (i, ins) in insurances.iter().enumerate() {
        if ins.member_id.trim().is_empty() {
            details.push(FieldError::new(
                format!("insurances[{}].memberId", i),
                "required",
            ));
        }
        if ins.insured_type == InsuredType::Dependent {
            let name_missing = ins
                .subscriber_name
                .as_deref()
                .map_or(true, |s| s.trim().is_empty());
            if name_missing || ins.subscriber_dob.is_none() {
                details.push(FieldError::new(
                    format!("insurances[{}]", i),
                    "Dependent insurance requires subscriberName and subscriberDob",
                ));
            }
        }
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(BillingError::validation_with(
            Entity::Patient,
            "Missing required insurance fields",
            details,
        ))
    }
}

async fn insert_policies(
    tx: &mut Transaction<'_, Postgres>,
    patient_id: Uuid,
    insurances: &[InsuranceInput],
    now: i64,
) -> BillingResult<Vec<PatientInsurance>> {
    let mut rows = Vec::with_capacity(insurances.len());
    for ins in insurances {
        let row: PatientInsurance = sqlx::query_as(
            r#"
            INSERT INTO patient_insurances (
                id, patient_id, plan_id, is_primary, insured_type,
                subscriber_name, subscriber_dob, member_id, insurance_card_path,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(ins.plan_id)
        .bind(ins.is_primary)
        .bind(ins.insured_type)
        .bind(&ins.subscriber_name)
        .bind(ins.subscriber_dob)
        .bind(&ins.member_id)
        .bind(&ins.insurance_card)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

async fn load_policies(
    tx: &mut Transaction<'_, Postgres>,
    patient_ids: &[Uuid],
) -> BillingResult<HashMap<Uuid, Vec<PatientInsurance>>> {
    let rows: Vec<PatientInsurance> = sqlx::query_as(
        "SELECT * FROM patient_insurances WHERE patient_id = ANY($1) ORDER BY created_at",
    )
    .bind(patient_ids)
    .fetch_all(&mut **tx)
    .await?;
    let mut grouped: HashMap<Uuid, Vec<PatientInsurance>> = HashMap::new();
    for row in rows {
        grouped.entry(row.patient_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn load_policies_for<'e, E>(executor: E, patient_id: Uuid) -> BillingResult<Vec<PatientInsurance>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<PatientInsurance> = sqlx::query_as(
        "SELECT * FROM patient_insurances WHERE patient_id = $1 ORDER BY created_at",
    )
    .bind(patient_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insurance(insured_type: InsuredType) -> InsuranceInput {
        InsuranceInput {
            plan_id: Uuid::new_v4(),
            is_primary: true,
            insured_type,
            subscriber_name: None,
            subscriber_dob: None,
            member_id: "BCBS123456789".into(),
            insurance_card: None,
        }
    }

    #[test]
    fn subscriber_coverage_needs_no_subscriber_fields() {
        assert!(validate_insurances(&[insurance(InsuredType::Subscriber)]).is_ok());
    }

    #[test]
    fn dependent_coverage_requires_subscriber_identity() {
        let err = validate_insurances(&[insurance(InsuredType::Dependent)]).unwrap_err();
        match err {
            BillingError::Validation { details, .. } => {
                assert_eq!(details.len(), 1);
                assert!(details[0].message.contains("subscriberName"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut complete = insurance(InsuredType::Dependent);
        complete.subscriber_name = Some("Ann Doe".into());
        complete.subscriber_dob = Some(476_755_200);
        assert!(validate_insurances(&[complete]).is_ok());
    }

    #[test]
    fn missing_member_id_is_reported_per_entry() {
        let mut ins = insurance(InsuredType::Subscriber);
        ins.member_id = "  ".into();
        let err = validate_insurances(&[ins]).unwrap_err();
        assert_eq!(err.details()[0].field, "insurances[0].memberId");
    }

    #[test]
    fn ssn_is_masked_to_last_four() {
        let mut patient = Patient {
            id: Uuid::new_v4(),
            prefix: None,
            first_name: "Jane".into(),
            middle_name: None,
            last_name: "Doe".into(),
            suffix: None,
            date_of_birth: 476_755_200,
            gender: None,
            ssn: Some("123-45-6789".into()),
            phone: None,
            email: None,
            address: None,
            organization_id: Uuid::new_v4(),
            source: DataSource::Native,
            created_by: None,
            updated_by: None,
            created_at: 0,
            updated_at: 0,
        };
        mask_ssn(&mut patient);
        assert_eq!(patient.ssn.as_deref(), Some("***-**-6789"));

        patient.ssn = None;
        mask_ssn(&mut patient);
        assert_eq!(patient.ssn, None);
    }
}
