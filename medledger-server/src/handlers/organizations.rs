use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::models::Organization;
use billing_core::organizations::{
    CreateOrganization, OrganizationListParams, UpdateOrganization,
};
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List organizations visible to the caller
#[utoipa::path(get, path = "/api/v1/organizations", tag = "organizations",
    responses((status = 200, description = "Organizations retrieved successfully")))]
pub async fn list_organizations(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<OrganizationListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Organization>>>> {
    let (organizations, total) = server
        .organizations()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Organization))?;
    Ok(Json(api_paginated(organizations, page.meta(total))))
}

/// Get an organization
#[utoipa::path(get, path = "/api/v1/organizations/{id}", tag = "organizations",
    responses(
        (status = 200, description = "Organization retrieved successfully"),
        (status = 404, description = "Organization not found")
    ))]
pub async fn get_organization(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Organization>>> {
    let organization = server
        .organizations()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Organization))?;
    Ok(Json(api_success(organization)))
}

/// Create an organization
#[utoipa::path(post, path = "/api/v1/organizations", tag = "organizations",
    responses(
        (status = 201, description = "Organization created successfully"),
        (status = 400, description = "Missing organization name")
    ))]
pub async fn create_organization(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateOrganization>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Organization>>)> {
    let organization = server
        .organizations()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Organization))?;
    Ok((StatusCode::CREATED, Json(api_success(organization))))
}

/// Update an organization
#[utoipa::path(put, path = "/api/v1/organizations/{id}", tag = "organizations",
    responses(
        (status = 200, description = "Organization updated successfully"),
        (status = 404, description = "Organization not found")
    ))]
pub async fn update_organization(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrganization>,
) -> ApiResult<Json<ApiResponse<Organization>>> {
    let organization = server
        .organizations()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Organization))?;
    Ok(Json(api_success(organization)))
}

/// Delete an organization with no remaining dependents
#[utoipa::path(delete, path = "/api/v1/organizations/{id}", tag = "organizations",
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 409, description = "Organization has dependent records")
    ))]
pub async fn delete_organization(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .organizations()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Organization))?;
    Ok(StatusCode::NO_CONTENT)
}
