use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::claims::{
    ClaimListParams, ClaimWithChildren, CreateClaim, UpdateClaim, UpdateClaimStatus,
};
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List claims
#[utoipa::path(get, path = "/api/v1/claims", tag = "claims",
    responses((status = 200, description = "Claims retrieved successfully")))]
pub async fn list_claims(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<ClaimListParams>,
) -> ApiResult<Json<ApiResponse<Vec<ClaimWithChildren>>>> {
    let (claims, total) = server
        .claims()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok(Json(api_paginated(claims, page.meta(total))))
}

/// Get a claim with its services and timeline
#[utoipa::path(get, path = "/api/v1/claims/{id}", tag = "claims",
    responses(
        (status = 200, description = "Claim retrieved successfully"),
        (status = 404, description = "Claim not found")
    ))]
pub async fn get_claim(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<ClaimWithChildren>>> {
    let claim = server
        .claims()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok(Json(api_success(claim)))
}

/// Create a claim with its service lines
#[utoipa::path(post, path = "/api/v1/claims", tag = "claims",
    responses(
        (status = 201, description = "Claim created successfully"),
        (status = 400, description = "Invalid claim payload"),
        (status = 409, description = "Claim number already exists")
    ))]
pub async fn create_claim(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateClaim>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ClaimWithChildren>>)> {
    let claim = server
        .claims()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok((StatusCode::CREATED, Json(api_success(claim))))
}

/// Update a claim; a supplied service set replaces the existing lines
#[utoipa::path(put, path = "/api/v1/claims/{id}", tag = "claims",
    responses(
        (status = 200, description = "Claim updated successfully"),
        (status = 403, description = "Claim outside your organization")
    ))]
pub async fn update_claim(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClaim>,
) -> ApiResult<Json<ApiResponse<ClaimWithChildren>>> {
    let claim = server
        .claims()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok(Json(api_success(claim)))
}

/// Update a claim's status, appending a timeline entry
#[utoipa::path(patch, path = "/api/v1/claims/{id}/status", tag = "claims",
    responses(
        (status = 200, description = "Claim status updated"),
        (status = 400, description = "Status is required"),
        (status = 403, description = "Claim outside your organization")
    ))]
pub async fn update_claim_status(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClaimStatus>,
) -> ApiResult<Json<ApiResponse<ClaimWithChildren>>> {
    let claim = server
        .claims()
        .update_status(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok(Json(api_success(claim)))
}

/// Delete a claim and its children
#[utoipa::path(delete, path = "/api/v1/claims/{id}", tag = "claims",
    responses(
        (status = 204, description = "Claim deleted"),
        (status = 403, description = "Claim outside your organization")
    ))]
pub async fn delete_claim(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .claims()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Claim))?;
    Ok(StatusCode::NO_CONTENT)
}
