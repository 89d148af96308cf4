use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of an authenticated user within their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum UserRole {
    Admin,
    Biller,
    Provider,
    FrontDesk,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Biller => "Biller",
            UserRole::Provider => "Provider",
            UserRole::FrontDesk => "FrontDesk",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(UserRole::Admin),
            "Biller" => Ok(UserRole::Biller),
            "Provider" => Ok(UserRole::Provider),
            "FrontDesk" => Ok(UserRole::FrontDesk),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Where a record originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum DataSource {
    Native,
    Imported,
    External,
}

/// Claim lifecycle states. The set is closed by policy; transitions are not
/// restricted to particular edges, but every change is audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ClaimStatus {
    Pending,
    Submitted,
    UnderReview,
    Denied,
    Paid,
    Appealed,
    Closed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Submitted => "Submitted",
            ClaimStatus::UnderReview => "UnderReview",
            ClaimStatus::Denied => "Denied",
            ClaimStatus::Paid => "Paid",
            ClaimStatus::Appealed => "Appealed",
            ClaimStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum InsuredType {
    Subscriber,
    Dependent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum PlanType {
    PPO,
    HMO,
    EPO,
    POS,
    Medicare,
    Medicaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum LicenseType {
    MD,
    DO,
    NP,
    PA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VisitType {
    New,
    FollowUp,
    Annual,
    Procedure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VisitLocation {
    InClinic,
    Telehealth,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VisitStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

/// Tenant root. Everything below an organization belongs to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub addresses: serde_json::Value,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub npi: Option<String>,
    pub parent_organization_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub organization_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub prefix: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub date_of_birth: i64,
    pub gender: Option<String>,
    /// Always masked to the last four digits before leaving the core.
    pub ssn: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<serde_json::Value>,
    pub organization_id: Uuid,
    pub source: DataSource,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub npi: Option<String>,
    pub specialty: Option<String>,
    pub license_type: LicenseType,
    pub organization_id: Uuid,
    pub source: DataSource,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payor {
    pub id: Uuid,
    pub name: String,
    pub external_payor_id: String,
    pub payor_category: String,
    pub billing_taxonomy: String,
    pub address: Option<serde_json::Value>,
    pub phone: Option<String>,
    pub portal_url: Option<String>,
    pub organization_id: Uuid,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PayorPlan {
    pub id: Uuid,
    pub payor_id: Uuid,
    pub plan_name: String,
    pub plan_type: PlanType,
    pub is_in_network: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A patient's enrollment in a specific payor plan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PatientInsurance {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub plan_id: Uuid,
    pub is_primary: bool,
    pub insured_type: InsuredType,
    pub subscriber_name: Option<String>,
    pub subscriber_dob: Option<i64>,
    pub member_id: String,
    pub insurance_card_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CptCode {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub specialty: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    pub organization_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
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
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A bill submitted to a payor for services rendered.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub claim_number: String,
    pub visit_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub payor_id: Uuid,
    pub organization_id: Uuid,
    pub service_date: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub billed_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub submission_date: Option<i64>,
    pub notes: Option<String>,
    pub source: DataSource,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One billed procedure line item within a claim.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClaimService {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub cpt_code_id: Uuid,
    pub description: Option<String>,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only audit entry for a claim. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTimelineEntry {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub action: String,
    pub status: ClaimStatus,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: i64,
}

/// Organization-scoped automation definition. The flow graph is stored
/// opaquely; a separate executor (out of scope here) interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: String,
    pub organization_id: Uuid,
    pub is_active: bool,
    pub flow_data: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Read-only record of an out-of-scope rule execution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecution {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub claim_id: Option<Uuid>,
    pub status: String,
    pub executed_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub claim_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            UserRole::Admin,
            UserRole::Biller,
            UserRole::Provider,
            UserRole::FrontDesk,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
        }
        assert!("Superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn claim_status_display_matches_wire_value() {
        let json = serde_json::to_string(&ClaimStatus::UnderReview).unwrap();
        assert_eq!(json, "\"UnderReview\"");
        assert_eq!(ClaimStatus::UnderReview.to_string(), "UnderReview");
    }

    #[test]
    fn user_never_serializes_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "biller@example.com".into(),
            password_hash: "$2b$12$secret".into(),
            first_name: "Sarah".into(),
            last_name: "Miles".into(),
            role: UserRole::Biller,
            organization_id: Uuid::new_v4(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("secret"));
    }
}
