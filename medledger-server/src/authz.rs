//! Declarative role policy.
//!
//! One table maps (method, route) to the roles allowed to reach it,
//! evaluated by middleware before any handler runs. Routes absent from the
//! table require authentication only. The core re-validates tenant scope;
//! this layer is solely about role reach.

use crate::auth::principal_from_headers;
use crate::error::ApiError;
use axum::extract::{MatchedPath, Request};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use billing_core::models::UserRole;

const ALL: &[UserRole] = &[
    UserRole::Admin,
    UserRole::Biller,
    UserRole::Provider,
    UserRole::FrontDesk,
];
const ADMIN: &[UserRole] = &[UserRole::Admin];
const BILLING: &[UserRole] = &[UserRole::Admin, UserRole::Biller];
const INTAKE: &[UserRole] = &[UserRole::Admin, UserRole::Biller, UserRole::FrontDesk];

#[rustfmt::skip]
static POLICIES: &[(Method, &str, &[UserRole])] = &[
    (Method::GET,    "/api/v1/organizations",             ALL),
    (Method::GET,    "/api/v1/organizations/:id",         ALL),
    (Method::POST,   "/api/v1/organizations",             ADMIN),
    (Method::PUT,    "/api/v1/organizations/:id",         ADMIN),
    (Method::DELETE, "/api/v1/organizations/:id",         ADMIN),

    (Method::GET,    "/api/v1/users",                     ALL),
    (Method::GET,    "/api/v1/users/:id",                 ALL),
    (Method::POST,   "/api/v1/users",                     ADMIN),
    (Method::PUT,    "/api/v1/users/:id",                 ADMIN),
    (Method::DELETE, "/api/v1/users/:id",                 ADMIN),

    (Method::GET,    "/api/v1/patients",                  ALL),
    (Method::GET,    "/api/v1/patients/:id",              ALL),
    (Method::POST,   "/api/v1/patients",                  INTAKE),
    (Method::PUT,    "/api/v1/patients/:id",              INTAKE),
    (Method::DELETE, "/api/v1/patients/:id",              BILLING),

    (Method::GET,    "/api/v1/providers",                 ALL),
    (Method::GET,    "/api/v1/providers/:id",             ALL),
    (Method::POST,   "/api/v1/providers",                 INTAKE),
    (Method::PUT,    "/api/v1/providers/:id",             INTAKE),
    (Method::DELETE, "/api/v1/providers/:id",             BILLING),

    (Method::GET,    "/api/v1/payors",                    ALL),
    (Method::GET,    "/api/v1/payors/:id",                ALL),
    (Method::POST,   "/api/v1/payors",                    BILLING),
    (Method::PUT,    "/api/v1/payors/:id",                BILLING),
    (Method::DELETE, "/api/v1/payors/:id",                BILLING),

    (Method::GET,    "/api/v1/insurance-policies",        ALL),
    (Method::GET,    "/api/v1/insurance-policies/:id",    ALL),
    (Method::PUT,    "/api/v1/insurance-policies/:id",    INTAKE),
    (Method::DELETE, "/api/v1/insurance-policies/:id",    BILLING),

    (Method::GET,    "/api/v1/cpt-codes",                 ALL),
    (Method::GET,    "/api/v1/cpt-codes/:id",             ALL),
    (Method::POST,   "/api/v1/cpt-codes",                 BILLING),
    (Method::PUT,    "/api/v1/cpt-codes/:id",             BILLING),
    (Method::DELETE, "/api/v1/cpt-codes/:id",             BILLING),

    (Method::GET,    "/api/v1/visits",                    ALL),
    (Method::GET,    "/api/v1/visits/:id",                ALL),
    (Method::POST,   "/api/v1/visits",                    ALL),
    (Method::PUT,    "/api/v1/visits/:id",                ALL),
    (Method::DELETE, "/api/v1/visits/:id",                BILLING),

    (Method::GET,    "/api/v1/claims",                    ALL),
    (Method::GET,    "/api/v1/claims/:id",                ALL),
    (Method::POST,   "/api/v1/claims",                    BILLING),
    (Method::PUT,    "/api/v1/claims/:id",                BILLING),
    (Method::PATCH,  "/api/v1/claims/:id/status",         BILLING),
    (Method::DELETE, "/api/v1/claims/:id",                BILLING),

    (Method::GET,    "/api/v1/rules",                     ALL),
    (Method::GET,    "/api/v1/rules/:id",                 ALL),
    (Method::POST,   "/api/v1/rules",                     BILLING),
    (Method::PUT,    "/api/v1/rules/:id",                 BILLING),
    (Method::PATCH,  "/api/v1/rules/:id/status",          BILLING),
    (Method::DELETE, "/api/v1/rules/:id",                 BILLING),

    (Method::GET,    "/api/v1/rule-executions",           ALL),
    (Method::GET,    "/api/v1/rule-executions/:id",       ALL),

    (Method::GET,    "/api/v1/attachments",               ALL),
    (Method::GET,    "/api/v1/attachments/:id/download",  ALL),
    (Method::POST,   "/api/v1/attachments",               ALL),
    (Method::DELETE, "/api/v1/attachments/:id",           BILLING),
];

pub fn allowed_roles(method: &Method, path: &str) -> Option<&'static [UserRole]> {
    POLICIES
        .iter()
        .find(|(m, p, _)| m == method && *p == path)
        .map(|(_, _, roles)| *roles)
}

pub async fn enforce_role_policy(req: Request, next: Next) -> Result<Response, ApiError> {
    let principal = principal_from_headers(req.headers())?;

    if let Some(matched) = req.extensions().get::<MatchedPath>() {
        if let Some(roles) = allowed_roles(req.method(), matched.as_str()) {
            if !roles.contains(&principal.role) {
                return Err(ApiError::forbidden("Role not permitted for this operation"));
            }
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinical_reads_are_open_to_all_roles() {
        let roles = allowed_roles(&Method::GET, "/api/v1/patients").unwrap();
        assert_eq!(roles.len(), 4);
    }

    #[test]
    fn claim_writes_are_restricted_to_billing_roles() {
        let roles = allowed_roles(&Method::POST, "/api/v1/claims").unwrap();
        assert!(roles.contains(&UserRole::Admin));
        assert!(roles.contains(&UserRole::Biller));
        assert!(!roles.contains(&UserRole::FrontDesk));
        assert!(!roles.contains(&UserRole::Provider));

        let roles = allowed_roles(&Method::PATCH, "/api/v1/claims/:id/status").unwrap();
        assert!(!roles.contains(&UserRole::Provider));
    }

    #[test]
    fn organization_management_is_admin_only() {
        let roles = allowed_roles(&Method::DELETE, "/api/v1/organizations/:id").unwrap();
        assert_eq!(roles, ADMIN);
    }

    #[test]
    fn unlisted_routes_have_no_role_restriction() {
        assert!(allowed_roles(&Method::GET, "/health").is_none());
    }
}
