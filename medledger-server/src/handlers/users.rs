use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::models::{User, UserRole};
use billing_core::users::{CreateUser, UpdateUser, UserListParams};
use error_common::Entity;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

/// User creation payload as received at the boundary. The password is
/// hashed here; the core only ever sees the hash.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub organization_id: Uuid,
}

/// List users
#[utoipa::path(get, path = "/api/v1/users", tag = "users",
    responses((status = 200, description = "Users retrieved successfully")))]
pub async fn list_users(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<UserListParams>,
) -> ApiResult<Json<ApiResponse<Vec<User>>>> {
    let (users, total) = server
        .users()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::User))?;
    Ok(Json(api_paginated(users, page.meta(total))))
}

/// Get a user
#[utoipa::path(get, path = "/api/v1/users/{id}", tag = "users",
    responses(
        (status = 200, description = "User retrieved successfully"),
        (status = 404, description = "User not found")
    ))]
pub async fn get_user(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = server
        .users()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::User))?;
    Ok(Json(api_success(user)))
}

/// Create a user
#[utoipa::path(post, path = "/api/v1/users", tag = "users",
    responses(
        (status = 201, description = "User created successfully"),
        (status = 409, description = "Email already in use")
    ))]
pub async fn create_user(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    if req.password.is_empty() {
        return Err(ApiError::wrap(Entity::User)(
            billing_core::BillingError::validation(
                Entity::User,
                "All required fields must be provided",
            ),
        ));
    }
    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal(Entity::User, format!("password hashing failed: {}", e)))?;

    let user = server
        .users()
        .create(
            &auth.principal,
            CreateUser {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role: req.role,
                organization_id: req.organization_id,
            },
        )
        .await
        .map_err(ApiError::wrap(Entity::User))?;
    Ok((StatusCode::CREATED, Json(api_success(user))))
}

/// Update a user's name or role
#[utoipa::path(put, path = "/api/v1/users/{id}", tag = "users",
    responses(
        (status = 200, description = "User updated successfully"),
        (status = 403, description = "User outside your organization")
    ))]
pub async fn update_user(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUser>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = server
        .users()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::User))?;
    Ok(Json(api_success(user)))
}

/// Delete a user without provenance records
#[utoipa::path(delete, path = "/api/v1/users/{id}", tag = "users",
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Self-deletion or cross-organization delete"),
        (status = 409, description = "User owns audit records")
    ))]
pub async fn delete_user(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .users()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::User))?;
    Ok(StatusCode::NO_CONTENT)
}
