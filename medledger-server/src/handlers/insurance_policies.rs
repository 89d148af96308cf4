use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::insurance_policies::{InsurancePolicyListParams, UpdateInsurancePolicy};
use billing_core::models::PatientInsurance;
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List insurance policies
#[utoipa::path(get, path = "/api/v1/insurance-policies", tag = "insurance-policies",
    responses((status = 200, description = "Insurance policies retrieved successfully")))]
pub async fn list_insurance_policies(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<InsurancePolicyListParams>,
) -> ApiResult<Json<ApiResponse<Vec<PatientInsurance>>>> {
    let (policies, total) = server
        .insurance_policies()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::InsurancePolicy))?;
    Ok(Json(api_paginated(policies, page.meta(total))))
}

/// Get an insurance policy
#[utoipa::path(get, path = "/api/v1/insurance-policies/{id}", tag = "insurance-policies",
    responses(
        (status = 200, description = "Insurance policy retrieved successfully"),
        (status = 404, description = "Insurance policy not found")
    ))]
pub async fn get_insurance_policy(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<PatientInsurance>>> {
    let policy = server
        .insurance_policies()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::InsurancePolicy))?;
    Ok(Json(api_success(policy)))
}

/// Update an insurance policy's subscriber fields
#[utoipa::path(put, path = "/api/v1/insurance-policies/{id}", tag = "insurance-policies",
    responses(
        (status = 200, description = "Insurance policy updated successfully"),
        (status = 404, description = "Insurance policy not found")
    ))]
pub async fn update_insurance_policy(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInsurancePolicy>,
) -> ApiResult<Json<ApiResponse<PatientInsurance>>> {
    let policy = server
        .insurance_policies()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::InsurancePolicy))?;
    Ok(Json(api_success(policy)))
}

/// Delete an insurance policy
#[utoipa::path(delete, path = "/api/v1/insurance-policies/{id}", tag = "insurance-policies",
    responses(
        (status = 204, description = "Insurance policy deleted"),
        (status = 404, description = "Insurance policy not found")
    ))]
pub async fn delete_insurance_policy(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .insurance_policies()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::InsurancePolicy))?;
    Ok(StatusCode::NO_CONTENT)
}
