use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::payors::{CreatePayor, PayorListParams, PayorWithPlans, UpdatePayor};
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List payors with their plans
#[utoipa::path(get, path = "/api/v1/payors", tag = "payors",
    responses((status = 200, description = "Payors retrieved successfully")))]
pub async fn list_payors(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<PayorListParams>,
) -> ApiResult<Json<ApiResponse<Vec<PayorWithPlans>>>> {
    let (payors, total) = server
        .payors()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Payor))?;
    Ok(Json(api_paginated(payors, page.meta(total))))
}

/// Get a payor with its plans
#[utoipa::path(get, path = "/api/v1/payors/{id}", tag = "payors",
    responses(
        (status = 200, description = "Payor retrieved successfully"),
        (status = 404, description = "Payor not found")
    ))]
pub async fn get_payor(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<PayorWithPlans>>> {
    let payor = server
        .payors()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Payor))?;
    Ok(Json(api_success(payor)))
}

/// Create a payor with at least one plan
#[utoipa::path(post, path = "/api/v1/payors", tag = "payors",
    responses(
        (status = 201, description = "Payor created successfully"),
        (status = 409, description = "External payor id already exists")
    ))]
pub async fn create_payor(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreatePayor>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PayorWithPlans>>)> {
    let payor = server
        .payors()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Payor))?;
    Ok((StatusCode::CREATED, Json(api_success(payor))))
}

/// Update a payor; a supplied plan set replaces the existing plans
#[utoipa::path(put, path = "/api/v1/payors/{id}", tag = "payors",
    responses(
        (status = 200, description = "Payor updated successfully"),
        (status = 403, description = "Payor outside your organization")
    ))]
pub async fn update_payor(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePayor>,
) -> ApiResult<Json<ApiResponse<PayorWithPlans>>> {
    let payor = server
        .payors()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Payor))?;
    Ok(Json(api_success(payor)))
}

/// Delete a payor with no plans or claims
#[utoipa::path(delete, path = "/api/v1/payors/{id}", tag = "payors",
    responses(
        (status = 204, description = "Payor deleted"),
        (status = 409, description = "Payor has dependent records")
    ))]
pub async fn delete_payor(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .payors()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Payor))?;
    Ok(StatusCode::NO_CONTENT)
}
