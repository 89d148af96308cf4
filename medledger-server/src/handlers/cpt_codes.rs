use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::cpt_codes::{CptCodeListParams, CreateCptCode, UpdateCptCode};
use billing_core::models::CptCode;
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List CPT codes
#[utoipa::path(get, path = "/api/v1/cpt-codes", tag = "cpt-codes",
    responses((status = 200, description = "CPT codes retrieved successfully")))]
pub async fn list_cpt_codes(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<CptCodeListParams>,
) -> ApiResult<Json<ApiResponse<Vec<CptCode>>>> {
    let (codes, total) = server
        .cpt_codes()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::CptCode))?;
    Ok(Json(api_paginated(codes, page.meta(total))))
}

/// Get a CPT code
#[utoipa::path(get, path = "/api/v1/cpt-codes/{id}", tag = "cpt-codes",
    responses(
        (status = 200, description = "CPT code retrieved successfully"),
        (status = 404, description = "CPT code not found")
    ))]
pub async fn get_cpt_code(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CptCode>>> {
    let code = server
        .cpt_codes()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::CptCode))?;
    Ok(Json(api_success(code)))
}

/// Create a CPT code
#[utoipa::path(post, path = "/api/v1/cpt-codes", tag = "cpt-codes",
    responses(
        (status = 201, description = "CPT code created successfully"),
        (status = 409, description = "Code already exists in this organization")
    ))]
pub async fn create_cpt_code(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateCptCode>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CptCode>>)> {
    let code = server
        .cpt_codes()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::CptCode))?;
    Ok((StatusCode::CREATED, Json(api_success(code))))
}

/// Update a CPT code
#[utoipa::path(put, path = "/api/v1/cpt-codes/{id}", tag = "cpt-codes",
    responses(
        (status = 200, description = "CPT code updated successfully"),
        (status = 403, description = "CPT code outside your organization")
    ))]
pub async fn update_cpt_code(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCptCode>,
) -> ApiResult<Json<ApiResponse<CptCode>>> {
    let code = server
        .cpt_codes()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::CptCode))?;
    Ok(Json(api_success(code)))
}

/// Delete a CPT code not referenced by any claim service
#[utoipa::path(delete, path = "/api/v1/cpt-codes/{id}", tag = "cpt-codes",
    responses(
        (status = 204, description = "CPT code deleted"),
        (status = 409, description = "CPT code is used in claim services")
    ))]
pub async fn delete_cpt_code(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .cpt_codes()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::CptCode))?;
    Ok(StatusCode::NO_CONTENT)
}
