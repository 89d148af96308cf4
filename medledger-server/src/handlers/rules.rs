use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::models::{Rule, RuleExecution};
use billing_core::rules::{
    CreateRule, RuleExecutionListParams, RuleListParams, UpdateRule,
};
use error_common::Entity;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRuleRequest {
    pub is_active: Option<bool>,
}

/// List rules
#[utoipa::path(get, path = "/api/v1/rules", tag = "rules",
    responses((status = 200, description = "Rules retrieved successfully")))]
pub async fn list_rules(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<RuleListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Rule>>>> {
    let (rules, total) = server
        .rules()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok(Json(api_paginated(rules, page.meta(total))))
}

/// Get a rule
#[utoipa::path(get, path = "/api/v1/rules/{id}", tag = "rules",
    responses(
        (status = 200, description = "Rule retrieved successfully"),
        (status = 404, description = "Rule not found")
    ))]
pub async fn get_rule(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Rule>>> {
    let rule = server
        .rules()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok(Json(api_success(rule)))
}

/// Create a rule with a structurally valid flow graph
#[utoipa::path(post, path = "/api/v1/rules", tag = "rules",
    responses(
        (status = 201, description = "Rule created successfully"),
        (status = 400, description = "Malformed flow graph"),
        (status = 409, description = "Rule name already exists")
    ))]
pub async fn create_rule(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreateRule>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Rule>>)> {
    let rule = server
        .rules()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok((StatusCode::CREATED, Json(api_success(rule))))
}

/// Update a rule
#[utoipa::path(put, path = "/api/v1/rules/{id}", tag = "rules",
    responses(
        (status = 200, description = "Rule updated successfully"),
        (status = 403, description = "Rule outside your organization")
    ))]
pub async fn update_rule(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRule>,
) -> ApiResult<Json<ApiResponse<Rule>>> {
    let rule = server
        .rules()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok(Json(api_success(rule)))
}

/// Toggle a rule's active flag
#[utoipa::path(patch, path = "/api/v1/rules/{id}/status", tag = "rules",
    responses(
        (status = 200, description = "Rule status updated"),
        (status = 400, description = "isActive field is required")
    ))]
pub async fn toggle_rule_status(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleRuleRequest>,
) -> ApiResult<Json<ApiResponse<Rule>>> {
    let rule = server
        .rules()
        .toggle(&auth.principal, id, req.is_active)
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok(Json(api_success(rule)))
}

/// Delete a rule that has never executed
#[utoipa::path(delete, path = "/api/v1/rules/{id}", tag = "rules",
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 409, description = "Rule has recorded executions")
    ))]
pub async fn delete_rule(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .rules()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Rule))?;
    Ok(StatusCode::NO_CONTENT)
}

/// List rule executions (read-only log)
#[utoipa::path(get, path = "/api/v1/rule-executions", tag = "rules",
    responses((status = 200, description = "Rule executions retrieved successfully")))]
pub async fn list_rule_executions(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<RuleExecutionListParams>,
) -> ApiResult<Json<ApiResponse<Vec<RuleExecution>>>> {
    let (executions, total) = server
        .rules()
        .list_executions(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::RuleExecution))?;
    Ok(Json(api_paginated(executions, page.meta(total))))
}

/// Get a rule execution
#[utoipa::path(get, path = "/api/v1/rule-executions/{id}", tag = "rules",
    responses(
        (status = 200, description = "Rule execution retrieved successfully"),
        (status = 404, description = "Rule execution not found")
    ))]
pub async fn get_rule_execution(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<RuleExecution>>> {
    let execution = server
        .rules()
        .get_execution(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::RuleExecution))?;
    Ok(Json(api_success(execution)))
}
