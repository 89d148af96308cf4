use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::Json;
use billing_core::attachments::{AttachmentListParams, NewAttachment};
use billing_core::models::Attachment;
use billing_core::BillingError;
use error_common::Entity;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::pagination::PaginationParams;
use crate::server::MedLedgerServer;
use crate::storage::sanitize_file_name;

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
const ALLOWED_TYPES: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "doc", "docx", "xls", "xlsx",
];

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::wrap(Entity::Attachment)(BillingError::validation(Entity::Attachment, message))
}

/// List attachments
#[utoipa::path(get, path = "/api/v1/attachments", tag = "attachments",
    responses((status = 200, description = "Attachments retrieved successfully")))]
pub async fn list_attachments(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Query(page): Query<PaginationParams>,
    Query(params): Query<AttachmentListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Attachment>>>> {
    let (attachments, total) = server
        .attachments()
        .list(&auth.principal, &params, page.limit() as i64, page.offset())
        .await
        .map_err(ApiError::wrap(Entity::Attachment))?;
    Ok(Json(api_paginated(attachments, page.meta(total))))
}

/// Upload an attachment for a claim or patient
#[utoipa::path(post, path = "/api/v1/attachments", tag = "attachments",
    responses(
        (status = 201, description = "Attachment uploaded successfully"),
        (status = 400, description = "Missing file, unsupported type or oversized payload")
    ))]
pub async fn upload_attachment(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<Attachment>>)> {
    let mut claim_id: Option<Uuid> = None;
    let mut patient_id: Option<Uuid> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| validation(format!("Malformed multipart payload: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("claimId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| validation("Invalid claimId field"))?;
                claim_id =
                    Some(text.parse().map_err(|_| validation("Invalid claimId field"))?);
            }
            Some("patientId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| validation("Invalid patientId field"))?;
                patient_id =
                    Some(text.parse().map_err(|_| validation("Invalid patientId field"))?);
            }
            Some("file") => {
                let name = sanitize_file_name(field.file_name().unwrap_or("upload"));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| validation(format!("Failed to read file: {}", e)))?;
                file = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| validation("No file provided"))?;
    if claim_id.is_none() && patient_id.is_none() {
        return Err(validation("Either claimId or patientId must be provided"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(validation(format!(
            "File size exceeds maximum allowed size of {}MB",
            MAX_FILE_SIZE / 1024 / 1024
        )));
    }
    let extension = file_name
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_TYPES.contains(&extension.as_str()) {
        return Err(validation(format!(
            "File type .{} is not allowed",
            extension
        )));
    }

    let key = Uuid::new_v4().to_string();
    let stored_path = server
        .storage()
        .save(&key, &file_name, &bytes)
        .await
        .map_err(|e| ApiError::internal(Entity::Attachment, format!("storage write failed: {}", e)))?;

    let result = server
        .attachments()
        .create(
            &auth.principal,
            NewAttachment {
                claim_id,
                patient_id,
                file_name: file_name.clone(),
                file_type: extension,
                file_size: bytes.len() as i64,
                file_path: stored_path.clone(),
            },
        )
        .await;

    match result {
        Ok(attachment) => Ok((StatusCode::CREATED, Json(api_success(attachment)))),
        Err(e) => {
            // The metadata row did not land; do not leave the blob behind.
            if let Err(cleanup) = server.storage().remove(&stored_path).await {
                warn!(path = %stored_path, error = %cleanup, "orphaned attachment blob");
            }
            Err(ApiError::wrap(Entity::Attachment)(e))
        }
    }
}

/// Download an attachment
#[utoipa::path(get, path = "/api/v1/attachments/{id}/download", tag = "attachments",
    responses(
        (status = 200, description = "Attachment contents"),
        (status = 404, description = "Attachment not found")
    ))]
pub async fn download_attachment(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<([(header::HeaderName, String); 2], Vec<u8>)> {
    let attachment = server
        .attachments()
        .get(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Attachment))?;

    let bytes = server
        .storage()
        .read(&attachment.file_path)
        .await
        .map_err(|_| {
            ApiError::wrap(Entity::Attachment)(BillingError::not_found(
                Entity::Attachment,
                "File not found on disk",
            ))
        })?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment.file_name),
            ),
        ],
        bytes,
    ))
}

/// Delete an attachment and its stored blob
#[utoipa::path(delete, path = "/api/v1/attachments/{id}", tag = "attachments",
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 404, description = "Attachment not found")
    ))]
pub async fn delete_attachment(
    State(server): State<MedLedgerServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let attachment = server
        .attachments()
        .delete(&auth.principal, id)
        .await
        .map_err(ApiError::wrap(Entity::Attachment))?;

    if let Err(e) = server.storage().remove(&attachment.file_path).await {
        warn!(path = %attachment.file_path, error = %e, "failed to remove attachment blob");
    }
    Ok(StatusCode::NO_CONTENT)
}
