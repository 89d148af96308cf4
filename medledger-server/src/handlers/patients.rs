use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use billing_core::patients::{
    CreatePatient, PatientListParams, PatientWithInsurance, UpdatePatient,
};
use error_common::Entity;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientGetParams {
    pub include_insurances: Option<bool>,
}

/// List patients (SSNs masked)
#[utoipa::path(get, path = "/api/v1/patients", tag = "patients",
    responses((status = 200, description = "Patients retrieved successfully")))]
pub async fn list_patients(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<PatientListParams>,
) -> ApiResult<Json<ApiResponse<Vec<PatientWithInsurance>>>> {
    let (patients, total) = server
        .patients()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Patient))?;
    Ok(Json(api_paginated(patients, page.meta(total))))
}

/// Get a patient
#[utoipa::path(get, path = "/api/v1/patients/{id}", tag = "patients",
    responses(
        (status = 200, description = "Patient retrieved successfully"),
        (status = 404, description = "Patient not found")
    ))]
pub async fn get_patient(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Query(params): Query<PatientGetParams>,
) -> ApiResult<Json<ApiResponse<PatientWithInsurance>>> {
    let patient = server
        .patients()
        .get(
            &auth.principal,
            id,
            params.include_insurances.unwrap_or(false),
        )
        .await
        .map_err(ApiError::wrap(Entity::Patient))?;
    Ok(Json(api_success(patient)))
}

/// Create a patient with optional insurance coverage
#[utoipa::path(post, path = "/api/v1/patients", tag = "patients",
    responses(
        (status = 201, description = "Patient created successfully"),
        (status = 400, description = "Invalid patient or insurance payload")
    ))]
pub async fn create_patient(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Json(req): Json<CreatePatient>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PatientWithInsurance>>)> {
    let patient = server
        .patients()
        .create(&auth.principal, req)
        .await
        .map_err(ApiError::wrap(Entity::Patient))?;
    Ok((StatusCode::CREATED, Json(api_success(patient))))
}

/// Update a patient; a supplied insurance set replaces the existing policies
#[utoipa::path(put, path = "/api/v1/patients/{id}", tag = "patients",
    responses(
        (status = 200, description = "Patient updated successfully"),
        (status = 403, description = "Patient outside your organization")
    ))]
pub async fn update_patient(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatient>,
) -> ApiResult<Json<ApiResponse<PatientWithInsurance>>> {
    let patient = server
        .patients()
        .update(&auth.principal, id, req)
        .await
        .map_err(ApiError::wrap(Entity::Patient))?;
    Ok(Json(api_success(patient)))
}

/// Delete a patient with no dependent records
#[utoipa::path(delete, path = "/api/v1/patients/{id}", tag = "patients",
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 409, description = "Patient has dependent records")
    ))]
pub async fn delete_patient(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    server
        .patients()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Patient))?;
    Ok(StatusCode::NO_CONTENT)
}
