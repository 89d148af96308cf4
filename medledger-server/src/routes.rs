use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::authz::enforce_role_policy;
use crate::handlers::{
    attachments, claims, cpt_codes, health, insurance_policies, organizations, patients, payors,
    providers, rules, users, visits,
};
use crate::server::MedLedgerServer;

pub fn organization_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/organizations", get(organizations::list_organizations))
        .route("/organizations", post(organizations::create_organization))
        .route("/organizations/:id", get(organizations::get_organization))
        .route("/organizations/:id", put(organizations::update_organization))
        .route("/organizations/:id", delete(organizations::delete_organization))
}

pub fn user_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
}

pub fn patient_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/patients", get(patients::list_patients))
        .route("/patients", post(patients::create_patient))
        .route("/patients/:id", get(patients::get_patient))
        .route("/patients/:id", put(patients::update_patient))
        .route("/patients/:id", delete(patients::delete_patient))
}

pub fn provider_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/providers", get(providers::list_providers))
        .route("/providers", post(providers::create_provider))
        .route("/providers/:id", get(providers::get_provider))
        .route("/providers/:id", put(providers::update_provider))
        .route("/providers/:id", delete(providers::delete_provider))
}

pub fn payor_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/payors", get(payors::list_payors))
        .route("/payors", post(payors::create_payor))
        .route("/payors/:id", get(payors::get_payor))
        .route("/payors/:id", put(payors::update_payor))
        .route("/payors/:id", delete(payors::delete_payor))
}

pub fn insurance_policy_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/insurance-policies", get(insurance_policies::list_insurance_policies))
        .route("/insurance-policies/:id", get(insurance_policies::get_insurance_policy))
        .route("/insurance-policies/:id", put(insurance_policies::update_insurance_policy))
        .route("/insurance-policies/:id", delete(insurance_policies::delete_insurance_policy))
}

pub fn cpt_code_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/cpt-codes", get(cpt_codes::list_cpt_codes))
        .route("/cpt-codes", post(cpt_codes::create_cpt_code))
        .route("/cpt-codes/:id", get(cpt_codes::get_cpt_code))
        .route("/cpt-codes/:id", put(cpt_codes::update_cpt_code))
        .route("/cpt-codes/:id", delete(cpt_codes::delete_cpt_code))
}

pub fn visit_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/visits", get(visits::list_visits))
        .route("/visits", post(visits::create_visit))
        .route("/visits/:id", get(visits::get_visit))
        .route("/visits/:id", put(visits::update_visit))
        .route("/visits/:id", delete(visits::delete_visit))
}

pub fn claim_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/claims", get(claims::list_claims))
        .route("/claims", post(claims::create_claim))
        .route("/claims/:id", get(claims::get_claim))
        .route("/claims/:id", put(claims::update_claim))
        .route("/claims/:id/status", patch(claims::update_claim_status))
        .route("/claims/:id", delete(claims::delete_claim))
}

pub fn rule_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/rules", get(rules::list_rules))
        .route("/rules", post(rules::create_rule))
        .route("/rules/:id", get(rules::get_rule))
        .route("/rules/:id", put(rules::update_rule))
        .route("/rules/:id/status", patch(rules::toggle_rule_status))
        .route("/rules/:id", delete(rules::delete_rule))
        .route("/rule-executions", get(rules::list_rule_executions))
        .route("/rule-executions/:id", get(rules::get_rule_execution))
}

pub fn attachment_routes() -> Router<MedLedgerServer> {
    Router::new()
        .route("/attachments", get(attachments::list_attachments))
        .route("/attachments", post(attachments::upload_attachment))
        .route("/attachments/:id/download", get(attachments::download_attachment))
        .route("/attachments/:id", delete(attachments::delete_attachment))
        // Uploads may carry up to 10MB of file plus multipart framing.
        .layer(DefaultBodyLimit::max(attachments::MAX_FILE_SIZE + 1024 * 1024))
}

/// Build the application router with all routes and middleware.
pub fn create_app(server: MedLedgerServer) -> Router {
    let api = Router::new()
        .merge(organization_routes())
        .merge(user_routes())
        .merge(patient_routes())
        .merge(provider_routes())
        .merge(payor_routes())
        .merge(insurance_policy_routes())
        .merge(cpt_code_routes())
        .merge(visit_routes())
        .merge(claim_routes())
        .merge(rule_routes())
        .merge(attachment_routes())
        .route_layer(middleware::from_fn(enforce_role_policy));

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(crate::openapi::ApiDoc::openapi()) }),
        )
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(server)
}
