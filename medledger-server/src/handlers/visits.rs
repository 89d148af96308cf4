use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::models::Visit;
use billing_core::visits::{CreateVisit, UpdateVisit, VisitListParams};
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List visits
#[utoipa::path(get, path = "/api/v1/visits", tag = "visits",
    responses((status = 200, description = "Visits retrieved successfully")))]
pub async fn list_visits(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<VisitListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Visit>>>> {
    let (visits, total) = server
        .visits()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Visit))?;
    Ok(Json(api_paginated(visits, page.meta(total))))
}

/// Get a visit
#[utoipa::path(get, path = "/api/v1/visits/{id}", tag = "visits",
    responses(
        (status = 200, description = "Visit retrieved successfully"),
        (status = 404, description = "Visit not found")
    ))]
pub async fn get_visit(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Visit>>> {
    let visit = server
        .visits()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Visit))?;
    Ok(Json(api_success(visit)))
}

/// Create a visit
#[utoipa::path(post, path = "/api/v1/visits", tag = "visits",
    responses(
        (status = 201, description = "Visit created successfully"),
        (status = 404, description = "Patient or provider not found")
    ))]
pub async fn create_visit(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateVisit>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Visit>>)> {
    let visit = server
        .visits()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Visit))?;
    Ok((StatusCode::CREATED, Json(api_success(visit))))
}

/// Update a visit
#[utoipa::path(put, path = "/api/v1/visits/{id}", tag = "visits",
    responses(
        (status = 200, description = "Visit updated successfully"),
        (status = 403, description = "Visit outside your organization")
    ))]
pub async fn update_visit(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVisit>,
) -> ApiResult<Json<ApiResponse<Visit>>> {
    let visit = server
        .visits()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Visit))?;
    Ok(Json(api_success(visit)))
}

/// Delete a visit with no dependent claims
#[utoipa::path(delete, path = "/api/v1/visits/{id}", tag = "visits",
    responses(
        (status = 204, description = "Visit deleted"),
        (status = 409, description = "Visit has dependent claims")
    ))]
pub async fn delete_visit(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .visits()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Visit))?;
    Ok(StatusCode::NO_CONTENT)
}
