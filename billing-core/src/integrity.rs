//! Referential-integrity validation.
//!
//! Before a record with foreign references is persisted, every referenced
//! entity must exist and belong to the same organization as the record being
//! written. Resolution happens inside the caller's transaction so a
//! concurrent delete of the referenced row cannot slip between validation
//! and the dependent write.

use crate::error::{BillingError, BillingResult};
use error_common::{Entity, FieldError};
use sqlx::{Postgres, Transaction};
use std::str::FromStr;
use uuid::Uuid;

/// How reference failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Return the first failing reference (observed upstream behavior).
    #[default]
    FailFast,
    /// Resolve every reference and report all failures at once.
    Exhaustive,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failfast" | "fail-fast" => Ok(ValidationMode::FailFast),
            "exhaustive" => Ok(ValidationMode::Exhaustive),
            other => Err(format!("unknown validation mode: {}", other)),
        }
    }
}

/// One foreign reference to resolve.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceCheck {
    pub entity: Entity,
    pub field: &'static str,
    pub id: Uuid,
}

impl ReferenceCheck {
    pub fn new(entity: Entity, field: &'static str, id: Uuid) -> Self {
        Self { entity, field, id }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceValidator {
    mode: ValidationMode,
}

impl ReferenceValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    /// Resolve each reference and verify it belongs to `organization_id`.
    /// Missing and cross-organization references fail identically, so a
    /// caller cannot probe for records in foreign tenants.
    pub async fn validate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        checks: &[ReferenceCheck],
    ) -> BillingResult<()> {
        let mut resolved = Vec::with_capacity(checks.len());
        for check in checks {
            let owner = resolve_owner(tx, check.entity, check.id).await?;
            resolved.push((*check, owner));
            // In fail-fast mode there is no point resolving the rest.
            if self.mode == ValidationMode::FailFast
                && owner.map_or(true, |org| org != organization_id)
            {
                break;
            }
        }
        evaluate(self.mode, organization_id, &resolved)
    }
}

/// Decide the outcome from resolved owners. Split out so the reporting
/// policy is testable without a database.
fn evaluate(
    mode: ValidationMode,
    organization_id: Uuid,
    resolved: &[(ReferenceCheck, Option<Uuid>)],
) -> BillingResult<()> {
    let mut failures: Vec<&ReferenceCheck> = Vec::new();
    for (check, owner) in resolved {
        if owner.map_or(true, |org| org != organization_id) {
            if mode == ValidationMode::FailFast {
                return Err(BillingError::foreign_key(
                    check.entity,
                    format!("{} not found", display_name(check.entity)),
                ));
            }
            failures.push(check);
        }
    }

    match failures.split_first() {
        None => Ok(()),
        Some((first, _)) => Err(BillingError::ForeignKey {
            entity: first.entity,
            message: format!("{} not found", display_name(first.entity)),
            details: failures
                .iter()
                .map(|c| {
                    FieldError::new(c.field, format!("{} not found", display_name(c.entity)))
                })
                .collect(),
        }),
    }
}

async fn resolve_owner(
    tx: &mut Transaction<'_, Postgres>,
    entity: Entity,
    id: Uuid,
) -> BillingResult<Option<Uuid>> {
    let sql = match entity {
        Entity::Organization => "SELECT id FROM organizations WHERE id = $1",
        Entity::Patient => "SELECT organization_id FROM patients WHERE id = $1",
        Entity::Provider => "SELECT organization_id FROM providers WHERE id = $1",
        Entity::Payor => "SELECT organization_id FROM payors WHERE id = $1",
        Entity::PayorPlan => {
            "SELECT p.organization_id FROM payor_plans pp \
             JOIN payors p ON p.id = pp.payor_id WHERE pp.id = $1"
        }
        Entity::CptCode => "SELECT organization_id FROM cpt_codes WHERE id = $1",
        Entity::Visit => "SELECT organization_id FROM visits WHERE id = $1",
        Entity::Claim => "SELECT organization_id FROM claims WHERE id = $1",
        other => {
            return Err(BillingError::foreign_key(
                other,
                format!("{} is not a resolvable reference", display_name(other)),
            ))
        }
    };

    let owner = sqlx::query_scalar::<_, Uuid>(sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(owner)
}

fn display_name(entity: Entity) -> &'static str {
    match entity {
        Entity::Organization => "Organization",
        Entity::User => "User",
        Entity::Patient => "Patient",
        Entity::Provider => "Provider",
        Entity::Payor => "Payor",
        Entity::PayorPlan => "Insurance plan",
        Entity::InsurancePolicy => "Insurance policy",
        Entity::CptCode => "CPT code",
        Entity::Visit => "Visit",
        Entity::Claim => "Claim",
        Entity::Rule => "Rule",
        Entity::RuleExecution => "Rule execution",
        Entity::Attachment => "Attachment",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(entity: Entity, field: &'static str) -> ReferenceCheck {
        ReferenceCheck::new(entity, field, Uuid::new_v4())
    }

    #[test]
    fn all_references_in_org_pass() {
        let org = Uuid::new_v4();
        let resolved = vec![
            (check(Entity::Patient, "patientId"), Some(org)),
            (check(Entity::Provider, "providerId"), Some(org)),
        ];
        assert!(evaluate(ValidationMode::FailFast, org, &resolved).is_ok());
        assert!(evaluate(ValidationMode::Exhaustive, org, &resolved).is_ok());
    }

    #[test]
    fn cross_org_reference_fails_like_missing() {
        let org = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let resolved = vec![(check(Entity::Patient, "patientId"), Some(foreign))];

        let err = evaluate(ValidationMode::FailFast, org, &resolved).unwrap_err();
        match err {
            BillingError::ForeignKey { entity, message, .. } => {
                assert_eq!(entity, Entity::Patient);
                assert_eq!(message, "Patient not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn fail_fast_reports_only_first_failure() {
        let org = Uuid::new_v4();
        let resolved = vec![
            (check(Entity::Patient, "patientId"), None),
            (check(Entity::Payor, "payorId"), None),
        ];
        let err = evaluate(ValidationMode::FailFast, org, &resolved).unwrap_err();
        match err {
            BillingError::ForeignKey { entity, details, .. } => {
                assert_eq!(entity, Entity::Patient);
                assert!(details.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn exhaustive_reports_every_failure() {
        let org = Uuid::new_v4();
        let resolved = vec![
            (check(Entity::Patient, "patientId"), None),
            (check(Entity::Provider, "providerId"), Some(org)),
            (check(Entity::Payor, "payorId"), Some(Uuid::new_v4())),
        ];
        let err = evaluate(ValidationMode::Exhaustive, org, &resolved).unwrap_err();
        match err {
            BillingError::ForeignKey { details, .. } => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["patientId", "payorId"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn mode_parses_from_env_tokens() {
        assert_eq!(
            "fail-fast".parse::<ValidationMode>(),
            Ok(ValidationMode::FailFast)
        );
        assert_eq!(
            "Exhaustive".parse::<ValidationMode>(),
            Ok(ValidationMode::Exhaustive)
        );
        assert!("strict".parse::<ValidationMode>().is_err());
    }
}
