//! Principal extraction.
//!
//! Authentication itself happens upstream: the session gateway resolves
//! credentials and forwards the principal as trusted headers. This module
//! only lifts those headers into a typed [`Principal`]; no credential ever
//! reaches this service.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use billing_core::models::UserRole;
use billing_core::Principal;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// Authenticated request context, extracted from gateway headers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
}

pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let user_id = parse_uuid(headers, USER_ID_HEADER)?;
    let organization_id = parse_uuid(headers, ORGANIZATION_ID_HEADER)?;
    let role: UserRole = header_str(headers, ROLE_HEADER)?
        .parse()
        .map_err(|_| ApiError::unauthorized("Unknown role in authentication context"))?;
    Ok(Principal::new(user_id, organization_id, role))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))
}

fn parse_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    header_str(headers, name)?
        .parse()
        .map_err(|_| ApiError::unauthorized(format!("Invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(&parts.headers)?;
        Ok(AuthContext { principal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(user: &str, org: &str, role: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        map.insert(ORGANIZATION_ID_HEADER, HeaderValue::from_str(org).unwrap());
        map.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        map
    }

    #[test]
    fn resolves_a_complete_principal() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let principal =
            principal_from_headers(&headers(&user.to_string(), &org.to_string(), "Biller"))
                .unwrap();
        assert_eq!(principal.user_id, user);
        assert_eq!(principal.organization_id, org);
        assert_eq!(principal.role, UserRole::Biller);
    }

    #[test]
    fn missing_or_malformed_headers_are_unauthorized() {
        let err = principal_from_headers(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));

        let err = principal_from_headers(&headers("not-a-uuid", "also-bad", "Biller")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));

        let org = Uuid::new_v4().to_string();
        let user = Uuid::new_v4().to_string();
        let err = principal_from_headers(&headers(&user, &org, "Superuser")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { .. }));
    }
}
