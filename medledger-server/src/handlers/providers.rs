use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::models::Provider;
use billing_core::providers::{CreateProvider, ProviderListParams, UpdateProvider};
use error_common::Entity;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// List providers
#[utoipa::path(get, path = "/api/v1/providers", tag = "providers",
    responses((status = 200, description = "Providers retrieved successfully")))]
pub async fn list_providers(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<ProviderListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Provider>>>> {
    let (providers, total) = server
        .providers()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Provider))?;
    Ok(Json(api_paginated(providers, page.meta(total))))
}

/// Get a provider
#[utoipa::path(get, path = "/api/v1/providers/{id}", tag = "providers",
    responses(
        (status = 200, description = "Provider retrieved successfully"),
        (status = 404, description = "Provider not found")
    ))]
pub async fn get_provider(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Provider>>> {
    let provider = server
        .providers()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Provider))?;
    Ok(Json(api_success(provider)))
}

/// Create a provider
#[utoipa::path(post, path = "/api/v1/providers", tag = "providers",
    responses(
        (status = 201, description = "Provider created successfully"),
        (status = 409, description = "NPI already registered in this organization")
    ))]
pub async fn create_provider(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateProvider>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Provider>>)> {
    let provider = server
        .providers()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Provider))?;
    Ok((StatusCode::CREATED, Json(api_success(provider))))
}

/// Update a provider
#[utoipa::path(put, path = "/api/v1/providers/{id}", tag = "providers",
    responses(
        (status = 200, description = "Provider updated successfully"),
        (status = 403, description = "Provider outside your organization")
    ))]
pub async fn update_provider(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProvider>,
) -> ApiResult<Json<ApiResponse<Provider>>> {
    let provider = server
        .providers()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Provider))?;
    Ok(Json(api_success(provider)))
}

/// Delete a provider with no visits or claims
#[utoipa::path(delete, path = "/api/v1/providers/{id}", tag = "providers",
    responses(
        (status = 204, description = "Provider deleted"),
        (status = 409, description = "Provider has dependent records")
    ))]
pub async fn delete_provider(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .providers()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Provider))?;
    Ok(StatusCode::NO_CONTENT)
}
