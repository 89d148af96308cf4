//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedLedger API",
        description = "Multi-tenant medical billing records API"
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::organizations::list_organizations,
        crate::handlers::organizations::get_organization,
        crate::handlers::organizations::create_organization,
        crate::handlers::organizations::update_organization,
        crate::handlers::organizations::delete_organization,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::patients::list_patients,
        crate::handlers::patients::get_patient,
        crate::handlers::patients::create_patient,
        crate::handlers::patients::update_patient,
        crate::handlers::patients::delete_patient,
        crate::handlers::providers::list_providers,
        crate::handlers::providers::get_provider,
        crate::handlers::providers::create_provider,
        crate::handlers::providers::update_provider,
        crate::handlers::providers::delete_provider,
        crate::handlers::payors::list_payors,
        crate::handlers::payors::get_payor,
        crate::handlers::payors::create_payor,
        crate::handlers::payors::update_payor,
        crate::handlers::payors::delete_payor,
        crate::handlers::insurance_policies::list_insurance_policies,
        crate::handlers::insurance_policies::get_insurance_policy,
        crate::handlers::insurance_policies::update_insurance_policy,
        crate::handlers::insurance_policies::delete_insurance_policy,
        crate::handlers::cpt_codes::list_cpt_codes,
        crate::handlers::cpt_codes::get_cpt_code,
        crate::handlers::cpt_codes::create_cpt_code,
        crate::handlers::cpt_codes::update_cpt_code,
        crate::handlers::cpt_codes::delete_cpt_code,
        crate::handlers::visits::list_visits,
        crate::handlers::visits::get_visit,
        crate::handlers::visits::create_visit,
        crate::handlers::visits::update_visit,
        crate::handlers::visits::delete_visit,
        crate::handlers::claims::list_claims,
        crate::handlers::claims::get_claim,
        crate::handlers::claims::create_claim,
        crate::handlers::claims::update_claim,
        crate::handlers::claims::update_claim_status,
        crate::handlers::claims::delete_claim,
        crate::handlers::rules::list_rules,
        crate::handlers::rules::get_rule,
        crate::handlers::rules::create_rule,
        crate::handlers::rules::update_rule,
        crate::handlers::rules::toggle_rule_status,
        crate::handlers::rules::delete_rule,
        crate::handlers::rules::list_rule_executions,
        crate::handlers::rules::get_rule_execution,
        crate::handlers::attachments::list_attachments,
        crate::handlers::attachments::upload_attachment,
        crate::handlers::attachments::download_attachment,
        crate::handlers::attachments::delete_attachment,
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "organizations", description = "Tenant organizations"),
        (name = "users", description = "User management"),
        (name = "patients", description = "Patient registry"),
        (name = "providers", description = "Provider registry"),
        (name = "payors", description = "Payors and plans"),
        (name = "insurance-policies", description = "Patient insurance coverage"),
        (name = "cpt-codes", description = "Procedure code catalog"),
        (name = "visits", description = "Visit records"),
        (name = "claims", description = "Claim lifecycle"),
        (name = "rules", description = "Automation rules and execution log"),
        (name = "attachments", description = "Claim and patient attachments")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/claims"));
        assert!(doc.paths.paths.contains_key("/api/v1/claims/{id}/status"));
    }
}
