use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity tag used as the prefix of every error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Organization,
    User,
    Patient,
    Provider,
    Payor,
    PayorPlan,
    InsurancePolicy,
    CptCode,
    Visit,
    Claim,
    Rule,
    RuleExecution,
    Attachment,
}

impl Entity {
    /// Upper-snake tag as it appears in error codes.
    pub fn tag(&self) -> &'static str {
        match self {
            Entity::Organization => "ORG",
            Entity::User => "USER",
            Entity::Patient => "PATIENT",
            Entity::Provider => "PROVIDER",
            Entity::Payor => "PAYOR",
            Entity::PayorPlan => "PAYOR_PLAN",
            Entity::InsurancePolicy => "INSURANCE_POLICY",
            Entity::CptCode => "CPT_CODE",
            Entity::Visit => "VISIT",
            Entity::Claim => "CLAIM",
            Entity::Rule => "RULE",
            Entity::RuleExecution => "RULE_EXECUTION",
            Entity::Attachment => "ATTACHMENT",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Reason suffix of an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NotFound,
    ValidationError,
    Duplicate,
    ForeignKeyError,
    Forbidden,
    DeleteFailed,
    InternalError,
}

impl Reason {
    pub fn suffix(&self) -> &'static str {
        match self {
            Reason::NotFound => "NOT_FOUND",
            Reason::ValidationError => "VALIDATION_ERROR",
            Reason::Duplicate => "DUPLICATE",
            Reason::ForeignKeyError => "FOREIGN_KEY_ERROR",
            Reason::Forbidden => "FORBIDDEN",
            Reason::DeleteFailed => "DELETE_FAILED",
            Reason::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Render the full `<ENTITY>_<REASON>` code.
    pub fn code(&self, entity: Entity) -> String {
        format!("{}_{}", entity.tag(), self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_entity_reason_convention() {
        assert_eq!(Reason::NotFound.code(Entity::Claim), "CLAIM_NOT_FOUND");
        assert_eq!(
            Reason::ValidationError.code(Entity::Patient),
            "PATIENT_VALIDATION_ERROR"
        );
        assert_eq!(Reason::Duplicate.code(Entity::CptCode), "CPT_CODE_DUPLICATE");
        assert_eq!(
            Reason::ForeignKeyError.code(Entity::PayorPlan),
            "PAYOR_PLAN_FOREIGN_KEY_ERROR"
        );
        assert_eq!(
            Reason::DeleteFailed.code(Entity::Organization),
            "ORG_DELETE_FAILED"
        );
    }

    #[test]
    fn entity_display_matches_tag() {
        assert_eq!(Entity::RuleExecution.to_string(), "RULE_EXECUTION");
    }
}
